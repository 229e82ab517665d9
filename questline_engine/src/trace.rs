//! Recorded observation traces.
//!
//! A trace is a RON list of steps as a position/state provider would report
//! them: map-relative positions plus modal context, flags, items and an
//! optional ASCII viewport. Replaying one through a `Session` exercises the
//! engine without an emulator attached.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::coords::{LocalCoord, MapId, MapRegistry};
use crate::grid::Viewport;
use crate::observation::{ModalContext, Observation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayTrace {
    pub name: String,
    pub steps: Vec<TraceStep>,
}

/// One reported state and the action the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    #[serde(default = "follow_route")]
    pub request: Action,
    pub map: u32,
    /// Map-relative row.
    pub row: i32,
    /// Map-relative column.
    pub col: i32,
    #[serde(default)]
    pub previous_map: Option<u32>,
    #[serde(default)]
    pub modal: ModalContext,
    #[serde(default)]
    pub flags: BTreeSet<String>,
    #[serde(default)]
    pub items: BTreeMap<String, u32>,
    #[serde(default)]
    pub party_size: u8,
    #[serde(default)]
    pub dialog: Option<String>,
    /// ASCII rows as accepted by [`Viewport::from_ascii`].
    #[serde(default)]
    pub viewport: Option<Vec<String>>,
}

fn follow_route() -> Action {
    Action::FollowRoute
}

impl TraceStep {
    /// Build the observation this step reports.
    ///
    /// # Errors
    /// Fails if the map is unknown or the viewport rows are malformed.
    pub fn to_observation(&self, maps: &MapRegistry) -> Result<Observation> {
        let position = maps.to_global(MapId(self.map), LocalCoord::new(self.row, self.col))?;
        let viewport = self
            .viewport
            .as_deref()
            .map(Viewport::from_ascii)
            .transpose()
            .context("parsing step viewport")?;
        Ok(Observation {
            position,
            previous_map: self.previous_map.map(MapId),
            modal: self.modal,
            flags: self.flags.clone(),
            items: self.items.clone(),
            party_size: self.party_size,
            dialog: self.dialog.clone(),
            viewport,
        })
    }
}

/// Load a replay trace from a RON file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_trace(path: &Path) -> Result<ReplayTrace> {
    let text = fs::read_to_string(path).with_context(|| format!("reading trace from '{}'", path.display()))?;
    ron::from_str(&text).with_context(|| format!("parsing trace RON from '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::test_support::{self, TOWN};
    use crate::coords::GlobalCoord;

    const TRACE: &str = r#"(
        name: "short",
        steps: [
            (map: 0, row: 5, col: 5, flags: ["woke_up"]),
            (request: interact, map: 0, row: 5, col: 6, modal: dialog, dialog: Some("Hello")),
            (map: 0, row: 5, col: 6, viewport: Some([
                "...",
                ".@.",
                "...",
            ])),
        ],
    )"#;

    #[test]
    fn steps_become_global_observations() {
        let trace: ReplayTrace = ron::from_str(TRACE).unwrap();
        let maps = test_support::atlas().maps;
        let first = trace.steps[0].to_observation(&maps).unwrap();
        assert_eq!(first.position, GlobalCoord::new(TOWN, 25, 25));
        assert!(first.has_flag("woke_up"));
        assert_eq!(trace.steps[0].request, Action::FollowRoute);

        assert_eq!(trace.steps[1].request, Action::Interact);
        assert!(trace.steps[1].to_observation(&maps).unwrap().modal.is_dialog());

        let third = trace.steps[2].to_observation(&maps).unwrap();
        assert_eq!(third.viewport.map(|v| v.rows()), Some(3));
    }

    #[test]
    fn unknown_maps_are_rejected() {
        let mut trace: ReplayTrace = ron::from_str(TRACE).unwrap();
        trace.steps[0].map = 99;
        assert!(trace.steps[0].to_observation(&test_support::atlas().maps).is_err());
    }
}
