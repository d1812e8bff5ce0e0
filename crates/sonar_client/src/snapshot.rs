//! Live signal sources and the per-tick eligibility snapshot.
//!
//! The actor reader and the static game tables are injected collaborators;
//! the engine only ever sees them through [`ActorSource`] and [`GameData`].

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::eligibility;

/// Online status text that marks the actor as role-playing.
pub const ROLEPLAYING_STATUS: &str = "Role-playing";

/// Intended-use classification of a territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneUse {
    City,
    OpenWorld,
    Inn,
    Dungeon,
    Trial,
    Raid,
    AllianceRaid,
    Pvp,
    GoldSaucer,
    HousingWard,
    HousingInterior,
    Eureka,
    Bozja,
    Other,
}

/// A map and the offset that turns actor coordinates into map coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    /// Map identifier as the server knows it, e.g. `s1f1/00`.
    pub id: String,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_z: f64,
}

impl MapInfo {
    /// Apply this map's coordinate offset to an actor position.
    #[must_use]
    pub fn adjust(&self, position: DVec2) -> DVec2 {
        position + DVec2::new(self.offset_x, self.offset_z)
    }
}

/// Static facts about one territory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritoryInfo {
    /// The map the territory is drawn on.
    pub map: MapInfo,
    /// What the territory is used for.
    pub zone_use: ZoneUse,
}

/// Read-only static game tables.
pub trait GameData: Send + Sync {
    /// Look up a territory by id.
    fn territory(&self, territory_id: u32) -> Option<TerritoryInfo>;
    /// Display name of a world.
    fn world_name(&self, world_id: u32) -> Option<String>;
    /// Display name of a map.
    fn map_name(&self, map_id: &str) -> Option<String>;
}

/// A point-in-time read of the local actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    pub world_id: u32,
    pub territory_id: u32,
    /// Ground-plane position `(x, z)`.
    pub position: DVec2,
    /// Online status text, e.g. `Role-playing`.
    pub online_status: String,
    /// Whether the actor is in PvP content.
    #[serde(default)]
    pub in_pvp: bool,
    /// Housing ward id while inside a housing district.
    #[serde(default)]
    pub housing_ward: Option<u32>,
}

/// Live actor reader.
pub trait ActorSource: Send + Sync {
    /// Whether a character is logged in.
    fn logged_in(&self) -> bool;
    /// The local actor, if one is present.
    fn local_actor(&self) -> Option<ActorState>;
}

/// Where a publish would attribute the actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub world_id: u32,
    /// The current map, never a map that is merely open on screen.
    pub map_id: String,
    /// Offset-adjusted position.
    pub position: DVec2,
}

/// Everything one evaluation needs, read fresh each time. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilitySnapshot {
    pub local_actor_present: bool,
    pub logged_in: bool,
    pub in_excluded_pvp_mode: bool,
    pub status_is_roleplaying: bool,
    pub in_housing_district: bool,
    pub zone_allowed: bool,
    /// Raw actor position, used for debouncing.
    pub position: DVec2,
    /// Publish target; `None` when the territory is unknown.
    pub placement: Option<Placement>,
}

impl EligibilitySnapshot {
    /// Read both collaborators and derive the snapshot.
    #[must_use]
    pub fn capture(actors: &dyn ActorSource, game_data: &dyn GameData) -> Self {
        let logged_in = actors.logged_in();
        let Some(actor) = actors.local_actor() else {
            return Self {
                local_actor_present: false,
                logged_in,
                in_excluded_pvp_mode: false,
                status_is_roleplaying: false,
                in_housing_district: false,
                zone_allowed: false,
                position: DVec2::ZERO,
                placement: None,
            };
        };

        let territory = game_data.territory(actor.territory_id);
        let zone_use = territory.as_ref().map(|t| t.zone_use);
        let placement = territory.map(|t| Placement {
            world_id: actor.world_id,
            position: t.map.adjust(actor.position),
            map_id: t.map.id,
        });

        Self {
            local_actor_present: true,
            logged_in,
            in_excluded_pvp_mode: actor.in_pvp || zone_use == Some(ZoneUse::Pvp),
            status_is_roleplaying: actor.online_status == ROLEPLAYING_STATUS,
            in_housing_district: actor.housing_ward.is_some()
                || zone_use == Some(ZoneUse::HousingWard),
            zone_allowed: zone_use.is_some_and(eligibility::zone_allowed),
            position: actor.position,
            placement,
        }
    }
}
