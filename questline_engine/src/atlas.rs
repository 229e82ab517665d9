//! atlas.rs -- the loaded, read-only world description
//!
//! An `Atlas` bundles the map registry, route store, ordered quest list and
//! per-tileset transition rules. It is built once by the loader and shared
//! between sessions.

use std::collections::BTreeMap;

use crate::coords::{MapId, MapRegistry};
use crate::grid::TransitionRules;
use crate::quest::Quest;
use crate::route::RouteStore;

#[derive(Debug, Clone, Default)]
pub struct Atlas {
    pub title: String,
    pub version: String,
    pub maps: MapRegistry,
    pub routes: RouteStore,
    /// Quests in progression order.
    pub quests: Vec<Quest>,
    /// Transition rules keyed by tileset id.
    pub tilesets: BTreeMap<String, TransitionRules>,
}

impl Atlas {
    pub fn quest(&self, id: &str) -> Option<&Quest> {
        self.quests.iter().find(|q| q.id == id)
    }

    /// Position of a quest in progression order.
    pub fn quest_index(&self, id: &str) -> Option<usize> {
        self.quests.iter().position(|q| q.id == id)
    }

    /// Tile transition rules for the tileset a map uses, if it declares one.
    pub fn transition_rules(&self, map: MapId) -> Option<&TransitionRules> {
        let tileset = self.maps.get(map)?.tileset.as_ref()?;
        self.tilesets.get(tileset)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TransitionRules;

    #[test]
    fn quests_are_found_by_id_and_order() {
        let atlas = test_support::atlas();
        assert_eq!(atlas.quest("003").map(|q| q.prerequisites.clone()), Some(vec!["004".to_string()]));
        assert_eq!(atlas.quest_index("004"), Some(3));
        assert!(atlas.quest("999").is_none());
    }

    #[test]
    fn transition_rules_follow_map_tileset() {
        let mut atlas = test_support::atlas();
        assert!(atlas.transition_rules(test_support::TOWN).is_none());

        let mut rules = TransitionRules::new();
        rules.block_pair(3, 4);
        atlas.tilesets.insert("overworld".into(), rules);
        let mut town = atlas.maps.info(test_support::TOWN).unwrap().clone();
        town.tileset = Some("overworld".into());
        atlas.maps.insert(town);

        assert_eq!(atlas.transition_rules(test_support::TOWN).map(TransitionRules::len), Some(1));
    }
}
