//! Line-delimited JSON host feed on stdin.
//!
//! Each line is one command:
//!
//! ```text
//! {"type":"actor","logged_in":true,"actor":{"world_id":73,"territory_id":132,"position":[1.0,2.0],"online_status":"Role-playing"}}
//! {"type":"broadcast","enabled":false}
//! {"type":"client","enabled":true}
//! {"type":"counts"}
//! {"type":"watching"}
//! {"type":"players","world_id":73,"map_id":"s1f1/00"}
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use sonar_client::counts::{self, SortSpec};
use sonar_client::{ActorSource, ActorState, ConnectionManager, GameTables, Settings};
use sonar_net::RemoteChannel;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// One feed command.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedCommand {
    /// Replace the local actor reading.
    Actor {
        #[serde(default = "default_logged_in")]
        logged_in: bool,
        #[serde(default)]
        actor: Option<ActorState>,
    },
    Broadcast { enabled: bool },
    Client { enabled: bool },
    Counts,
    Watching,
    Players { world_id: u32, map_id: String },
}

fn default_logged_in() -> bool {
    true
}

#[derive(Debug, Default)]
struct Reading {
    logged_in: bool,
    actor: Option<ActorState>,
}

/// The most recent actor reading from the feed.
#[derive(Debug, Default)]
pub struct FeedActor {
    reading: Mutex<Reading>,
}

impl FeedActor {
    pub fn set(&self, logged_in: bool, actor: Option<ActorState>) {
        let mut reading = self.reading.lock().unwrap_or_else(PoisonError::into_inner);
        reading.logged_in = logged_in;
        reading.actor = actor;
    }
}

impl ActorSource for FeedActor {
    fn logged_in(&self) -> bool {
        self.reading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .logged_in
    }

    fn local_actor(&self) -> Option<ActorState> {
        self.reading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .actor
            .clone()
    }
}

/// Everything a command can act on.
pub struct FeedContext<C: RemoteChannel> {
    pub actor: Arc<FeedActor>,
    pub settings: Arc<Settings>,
    pub manager: Arc<ConnectionManager<C>>,
    pub tables: Arc<GameTables>,
}

impl<C: RemoteChannel> FeedContext<C> {
    async fn apply(&self, command: FeedCommand) {
        match command {
            FeedCommand::Actor { logged_in, actor } => {
                debug!(logged_in, present = actor.is_some(), "actor reading");
                self.actor.set(logged_in, actor);
            }
            FeedCommand::Broadcast { enabled } => {
                self.settings.set_broadcast_enabled(enabled);
            }
            FeedCommand::Client { enabled } => {
                self.settings.set_client_enabled(enabled);
            }
            FeedCommand::Counts => match self.manager.world_map_counts().await {
                Ok(raw) => {
                    for world in counts::count_tree(&raw, &*self.tables, SortSpec::default()) {
                        info!(world = %world.location, count = world.count, "role-playing now");
                        for map in &world.sub_locations {
                            info!(world = %world.location, map = %map.location, count = map.count, "role-playing now");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "count query failed"),
            },
            FeedCommand::Watching => match self.manager.watching_for_rp_count().await {
                Ok(count) => info!(count, "watching for role-play"),
                Err(e) => warn!(error = %e, "watching query failed"),
            },
            FeedCommand::Players { world_id, map_id } => {
                match self.manager.players_in_world_map(world_id, &map_id).await {
                    Ok(markers) => {
                        info!(world_id, %map_id, players = markers.len(), "players on map");
                        for marker in markers {
                            info!(x = marker.x, z = marker.z, "player marker");
                        }
                    }
                    Err(e) => warn!(error = %e, "players query failed"),
                }
            }
        }
    }

    /// Apply commands from `input` until it ends.
    pub async fn run<R: AsyncBufRead + Unpin>(self, input: R) {
        let mut lines = input.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match serde_json::from_str::<FeedCommand>(&line) {
                    Ok(command) => self.apply(command).await,
                    Err(e) => warn!(error = %e, "ignoring malformed feed line"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "feed read failed");
                    break;
                }
            }
        }
        info!("feed closed");
    }
}
