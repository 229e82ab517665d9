//! condition.rs -- `TriggerCondition` Module
//!
//! Predicates over the externally reported state that together define when a
//! quest is complete. They only read the observation; nothing here mutates it.

use std::collections::BTreeSet;

use regex::Regex;

use crate::coords::{GlobalCoord, MapId};
use crate::observation::Observation;
use crate::quest::QuestId;

/// An observable fact required by a quest.
#[derive(Debug, Clone)]
pub enum TriggerCondition {
    EventFlag(String),
    MissingEventFlag(String),
    HasItem { item: String, min: u32 },
    MissingItem(String),
    InMap(MapId),
    PreviousMap(MapId),
    MapTransition { from: MapId, to: MapId },
    PartySize(u8),
    DialogContains(String),
    DialogMatches(Regex),
    AtCoordinate(GlobalCoord),
    InArea {
        map: MapId,
        top_left: (i32, i32),
        bottom_right: (i32, i32),
    },
    QuestCompleted(QuestId),
}

impl TriggerCondition {
    /// Evaluate against this step's observation and the set of completed quests.
    pub fn is_satisfied(&self, obs: &Observation, completed: &BTreeSet<QuestId>) -> bool {
        let here = &obs.position;
        match self {
            Self::EventFlag(flag) => obs.has_flag(flag),
            Self::MissingEventFlag(flag) => !obs.has_flag(flag),
            Self::HasItem { item, min } => obs.item_count(item) >= *min,
            Self::MissingItem(item) => obs.item_count(item) == 0,
            Self::InMap(map) => here.map == *map,
            Self::PreviousMap(map) => obs.previous_map == Some(*map),
            Self::MapTransition { from, to } => obs.previous_map == Some(*from) && here.map == *to,
            Self::PartySize(min) => obs.party_size >= *min,
            Self::DialogContains(text) => obs
                .dialog
                .as_deref()
                .is_some_and(|dialog| normalize_whitespace(dialog).contains(&normalize_whitespace(text))),
            Self::DialogMatches(pattern) => obs
                .dialog
                .as_deref()
                .is_some_and(|dialog| pattern.is_match(&normalize_whitespace(dialog))),
            Self::AtCoordinate(at) => here == at,
            Self::InArea {
                map,
                top_left,
                bottom_right,
            } => {
                here.map == *map
                    && (top_left.0..=bottom_right.0).contains(&here.row)
                    && (top_left.1..=bottom_right.1).contains(&here.col)
            },
            Self::QuestCompleted(quest) => completed.contains(quest),
        }
    }
}

/// Collapse runs of whitespace (including line breaks in dialog boxes) to single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
