//! Per-step state reported by the caller after each executed action.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::coords::{GlobalCoord, MapId};
use crate::grid::Viewport;

/// Whether an overlay owns the controls this step.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Variantly)]
#[serde(rename_all = "camelCase")]
pub enum ModalContext {
    #[default]
    Overworld,
    Dialog,
    Menu,
    Battle,
}

impl ModalContext {
    /// Any context other than free overworld movement.
    pub fn is_active(self) -> bool {
        !self.is_overworld()
    }
}

/// Everything the engine knows about the world for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub position: GlobalCoord,
    #[serde(default)]
    pub previous_map: Option<MapId>,
    #[serde(default)]
    pub modal: ModalContext,
    #[serde(default)]
    pub flags: BTreeSet<String>,
    /// Item id to quantity held.
    #[serde(default)]
    pub items: BTreeMap<String, u32>,
    #[serde(default)]
    pub party_size: u8,
    /// Text of the dialog box currently on screen.
    #[serde(default)]
    pub dialog: Option<String>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

impl Observation {
    /// A bare overworld observation at `position`.
    pub fn at(position: GlobalCoord) -> Self {
        Self {
            position,
            previous_map: None,
            modal: ModalContext::Overworld,
            flags: BTreeSet::new(),
            items: BTreeMap::new(),
            party_size: 0,
            dialog: None,
            viewport: None,
        }
    }

    #[must_use]
    pub fn with_modal(mut self, modal: ModalContext) -> Self {
        self.modal = modal;
        self
    }

    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    #[must_use]
    pub fn with_item(mut self, item: impl Into<String>, quantity: u32) -> Self {
        self.items.insert(item.into(), quantity);
        self
    }

    #[must_use]
    pub fn with_previous_map(mut self, map: MapId) -> Self {
        self.previous_map = Some(map);
        self
    }

    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn item_count(&self, item: &str) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }
}
