//! Shared data model for questline atlases.

pub mod defs;
pub mod validate;

pub use defs::*;
pub use validate::{ValidationError, validate_atlas};
