//! Actions the engine accepts and emits, and the record of where each emitted action came from.

use std::fmt;

use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::coords::Direction;
use crate::navigator::NavError;
use questline_data::ActionDef;

/// One discrete step for the external executor.
///
/// `FollowRoute` is a request only: "keep moving toward the objective". The
/// engine resolves it into a concrete action or hands it back unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Variantly)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Walk(Direction),
    Interact,
    Cancel,
    Menu,
    Noop,
    FollowRoute,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Walk(direction) => write!(f, "walk {direction}"),
            Action::Interact => f.write_str("interact"),
            Action::Cancel => f.write_str("cancel"),
            Action::Menu => f.write_str("menu"),
            Action::Noop => f.write_str("noop"),
            Action::FollowRoute => f.write_str("follow route"),
        }
    }
}

impl From<ActionDef> for Action {
    fn from(def: ActionDef) -> Self {
        match def {
            ActionDef::Walk(direction) => Action::Walk(direction.into()),
            ActionDef::Interact => Action::Interact,
            ActionDef::Cancel => Action::Cancel,
            ActionDef::Menu => Action::Menu,
            ActionDef::Noop => Action::Noop,
        }
    }
}

/// Which part of the engine produced a decision.
#[derive(Debug, Clone, PartialEq, Eq, Variantly)]
pub enum DecisionSource {
    /// A dialog, menu or battle was open; the request passed through untouched.
    Modal,
    /// A concrete request with no rule in force.
    Requested,
    Navigator,
    StageRule(String),
    /// Next step of a forced sequence started by an earlier rule.
    ForcedSequence,
    /// The active quest is waiting on prerequisites.
    Blocked,
    /// Every quest is complete.
    Complete,
    /// Navigation failed; the request is returned as-is.
    Fallback(NavError),
}

/// The action to execute this step and why it was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub source: DecisionSource,
}

impl Decision {
    pub fn new(action: Action, source: DecisionSource) -> Self {
        Self { action, source }
    }
}
