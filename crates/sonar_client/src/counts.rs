//! The "role-playing now" count tree.
//!
//! `GetWorldMapCounts` returns flat `prefix:world:map` keys. They are resolved
//! to display names, grouped per world and sorted for display.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::snapshot::GameData;

/// One resolved count entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldPlayerCount {
    pub world_name: String,
    pub location: String,
    pub count: i64,
}

/// A row of the count tree. World rows hold their maps as sub-locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCountNode {
    pub location: String,
    pub count: i64,
    pub sub_locations: Vec<PlayerCountNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Location,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// How to order the tree. The default is location, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: SortColumn::Location,
            direction: SortDirection::Descending,
        }
    }
}

/// Split a `prefix:world:map` key. `None` unless it has exactly three parts
/// and a numeric world.
fn parse_key(key: &str) -> Option<(u32, &str)> {
    let mut parts = key.split(':');
    let (Some(_prefix), Some(world), Some(map), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    Some((world.parse().ok()?, map))
}

/// Resolve raw counts to display names. Malformed keys are skipped.
#[must_use]
pub fn resolve_counts(raw: &HashMap<String, i64>, game_data: &dyn GameData) -> Vec<WorldPlayerCount> {
    raw.iter()
        .filter_map(|(key, &count)| {
            let Some((world_id, map_id)) = parse_key(key) else {
                debug!(key, "skipping malformed count key");
                return None;
            };
            Some(WorldPlayerCount {
                world_name: game_data
                    .world_name(world_id)
                    .unwrap_or_else(|| world_id.to_string()),
                location: game_data
                    .map_name(map_id)
                    .unwrap_or_else(|| map_id.to_string()),
                count,
            })
        })
        .collect()
}

/// Group per world. Each world's count is the sum of its locations.
#[must_use]
pub fn build_tree(counts: Vec<WorldPlayerCount>) -> Vec<PlayerCountNode> {
    let mut worlds: BTreeMap<String, Vec<PlayerCountNode>> = BTreeMap::new();
    for entry in counts {
        worlds.entry(entry.world_name).or_default().push(PlayerCountNode {
            location: entry.location,
            count: entry.count,
            sub_locations: Vec::new(),
        });
    }

    worlds
        .into_iter()
        .map(|(world, sub_locations)| PlayerCountNode {
            location: world,
            count: sub_locations.iter().map(|n| n.count).sum(),
            sub_locations,
        })
        .collect()
}

/// Order two rows under `spec`.
#[must_use]
pub fn compare(a: &PlayerCountNode, b: &PlayerCountNode, spec: SortSpec) -> Ordering {
    let ordering = match spec.column {
        SortColumn::Location => a.location.cmp(&b.location),
        SortColumn::Count => a.count.cmp(&b.count),
    };
    match spec.direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Sort the rows and, recursively, their sub-locations.
pub fn sort_tree(nodes: &mut [PlayerCountNode], spec: SortSpec) {
    nodes.sort_by(|a, b| compare(a, b, spec));
    for node in nodes {
        sort_tree(&mut node.sub_locations, spec);
    }
}

/// Resolve, group and sort in one go.
#[must_use]
pub fn count_tree(
    raw: &HashMap<String, i64>,
    game_data: &dyn GameData,
    spec: SortSpec,
) -> Vec<PlayerCountNode> {
    let mut tree = build_tree(resolve_counts(raw, game_data));
    sort_tree(&mut tree, spec);
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_tables;

    fn raw() -> HashMap<String, i64> {
        HashMap::from([
            ("rp:73:s1f1/00".to_string(), 3),
            ("rp:73:s1h1/00".to_string(), 5),
            ("rp:74:s1f1/00".to_string(), 1),
            ("rp:73:unknown/00".to_string(), 2),
            ("broken".to_string(), 9),
            ("rp:x:s1f1/00".to_string(), 9),
            ("rp:73:a:b".to_string(), 9),
        ])
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("rp:73:s1f1/00"), Some((73, "s1f1/00")));
        assert_eq!(parse_key("rp:73"), None);
        assert_eq!(parse_key("rp:73:a:b"), None);
        assert_eq!(parse_key("rp:world:a"), None);
    }

    #[test]
    fn test_resolve_falls_back_to_raw_ids() {
        let resolved = resolve_counts(&raw(), &sample_tables());
        assert_eq!(resolved.len(), 4);
        assert!(resolved.contains(&WorldPlayerCount {
            world_name: "Balmung".to_string(),
            location: "unknown/00".to_string(),
            count: 2,
        }));
        assert!(resolved.contains(&WorldPlayerCount {
            world_name: "74".to_string(),
            location: "Central Shroud".to_string(),
            count: 1,
        }));
    }

    #[test]
    fn test_parent_count_is_sum_of_children() {
        let tree = count_tree(&raw(), &sample_tables(), SortSpec::default());
        let balmung = tree.iter().find(|n| n.location == "Balmung").unwrap();
        assert_eq!(balmung.count, 10);
        assert_eq!(balmung.sub_locations.len(), 3);
    }

    #[test]
    fn test_default_sort_is_location_descending() {
        let tree = count_tree(&raw(), &sample_tables(), SortSpec::default());
        let worlds: Vec<_> = tree.iter().map(|n| n.location.as_str()).collect();
        assert_eq!(worlds, vec!["Balmung", "74"]);

        let maps: Vec<_> = tree[0]
            .sub_locations
            .iter()
            .map(|n| n.location.as_str())
            .collect();
        assert_eq!(maps, vec!["unknown/00", "The Lavender Beds", "Central Shroud"]);
    }

    #[test]
    fn test_sort_by_count_ascending_recurses() {
        let spec = SortSpec {
            column: SortColumn::Count,
            direction: SortDirection::Ascending,
        };
        let tree = count_tree(&raw(), &sample_tables(), spec);
        let counts: Vec<_> = tree.iter().map(|n| n.count).collect();
        assert_eq!(counts, vec![1, 10]);
        let sub: Vec<_> = tree[1].sub_locations.iter().map(|n| n.count).collect();
        assert_eq!(sub, vec![2, 3, 5]);
    }
}
