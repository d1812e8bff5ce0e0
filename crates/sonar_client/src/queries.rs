//! Typed read-only queries against the presence service.

use std::collections::HashMap;

use sonar_net::RemoteChannel;
use sonar_net::messages::{MarkerPosition, NO_ARGS, WorldMapQuery};
use sonar_net::methods::{
    GET_CURRENT_WATCHING_FOR_RP_COUNT, GET_PLAYERS_IN_WORLD_MAP, GET_WORLD_MAP_COUNTS,
};

use crate::error::ConnectionError;
use crate::manager::ConnectionManager;

impl<C: RemoteChannel> ConnectionManager<C> {
    /// Positions of everyone broadcasting on `map_id` of `world_id`.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::invoke`].
    pub async fn players_in_world_map(
        &self,
        world_id: u32,
        map_id: &str,
    ) -> Result<Vec<MarkerPosition>, ConnectionError> {
        let query = WorldMapQuery {
            world_id,
            map_id: map_id.to_string(),
        };
        self.invoke(GET_PLAYERS_IN_WORLD_MAP, &query).await
    }

    /// Broadcasting counts keyed `prefix:world:map`. See [`crate::counts`].
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::invoke`].
    pub async fn world_map_counts(&self) -> Result<HashMap<String, i64>, ConnectionError> {
        self.invoke(GET_WORLD_MAP_COUNTS, &NO_ARGS).await
    }

    /// Number of clients currently watching for role-play.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::invoke`].
    pub async fn watching_for_rp_count(&self) -> Result<i64, ConnectionError> {
        self.invoke(GET_CURRENT_WATCHING_FOR_RP_COUNT, &NO_ARGS).await
    }
}

#[cfg(test)]
mod tests {
    use sonar_net::ConnectionConfig;

    use super::*;
    use crate::test_support::ScriptedChannel;

    async fn connected_manager() -> ConnectionManager<ScriptedChannel> {
        let manager = ConnectionManager::new(ScriptedChannel::new());
        manager.enable(&ConnectionConfig::default()).await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_players_in_world_map_sends_positional_args() {
        let manager = connected_manager().await;
        manager
            .channel()
            .reply(GET_PLAYERS_IN_WORLD_MAP, &vec![(10.0f64, 20.0f64)]);

        let markers = manager.players_in_world_map(73, "s1f1/00").await.unwrap();
        assert_eq!(markers, vec![MarkerPosition { x: 10.0, z: 20.0 }]);

        let calls = manager.channel().calls();
        let (world_id, map_id): (u32, String) = rmp_serde::from_slice(&calls[0].args).unwrap();
        assert_eq!((world_id, map_id.as_str()), (73, "s1f1/00"));
    }

    #[tokio::test]
    async fn test_world_map_counts() {
        let manager = connected_manager().await;
        let counts = HashMap::from([("rp:73:s1f1/00".to_string(), 4i64)]);
        manager.channel().reply(GET_WORLD_MAP_COUNTS, &counts);

        assert_eq!(manager.world_map_counts().await.unwrap(), counts);
    }

    #[tokio::test]
    async fn test_queries_fail_when_disconnected() {
        let manager = ConnectionManager::new(ScriptedChannel::new());
        let err = manager.watching_for_rp_count().await.unwrap_err();
        assert!(matches!(err, ConnectionError::NotConnected));
    }
}
