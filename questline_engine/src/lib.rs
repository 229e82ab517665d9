#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! Navigation and quest-progression engine for tile-based worlds.
//!
//! Each step the caller reports the agent's state as an [`Observation`] and asks
//! for an [`Action`]; a [`Session`] tracks quest progress, filters the request
//! through scripted stage rules and, when asked to follow the route, produces a
//! concrete move from the route store and the local pathfinder.

pub const QUESTLINE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod action;
pub mod atlas;
pub mod config;
pub mod coords;
pub mod data_paths;
pub mod grid;
pub mod loader;
pub mod navigator;
pub mod observation;
pub mod quest;
pub mod route;
pub mod save_files;
pub mod session;
pub mod slug;
pub mod trace;

pub use action::{Action, Decision, DecisionSource};
pub use atlas::Atlas;
pub use config::{EngineConfig, load_config};
pub use coords::{Direction, GlobalCoord, LocalCoord, MapId, MapRegistry, UnknownMapError};
pub use grid::{LedgeFidelity, Pathfinder, TransitionRules, Viewport};
pub use loader::{load_atlas, load_atlas_from};
pub use navigator::{NavError, Navigator, NavigatorState};
pub use observation::{ModalContext, Observation};
pub use quest::{ProgressEvent, QuestMachine, QuestPhase, QuestState};
pub use route::{RouteKey, RouteSegment, RouteStore, WarpPoint, nearest_point};
pub use session::{Session, SessionSnapshot, StepOutcome};
