//! In-memory game tables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::{GameData, TerritoryInfo};

/// Static territory, world and map tables held in memory.
///
/// Deserialises from JSON of the form
/// `{"territories": {"132": {...}}, "worlds": {"73": "Balmung"}, "maps": {"s1f1/00": "Central Shroud"}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameTables {
    #[serde(default)]
    pub territories: HashMap<u32, TerritoryInfo>,
    #[serde(default)]
    pub worlds: HashMap<u32, String>,
    #[serde(default)]
    pub maps: HashMap<String, String>,
}

impl GameData for GameTables {
    fn territory(&self, territory_id: u32) -> Option<TerritoryInfo> {
        self.territories.get(&territory_id).cloned()
    }

    fn world_name(&self, world_id: u32) -> Option<String> {
        self.worlds.get(&world_id).cloned()
    }

    fn map_name(&self, map_id: &str) -> Option<String> {
        self.maps.get(map_id).cloned()
    }
}
