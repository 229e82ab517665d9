//! Loader utilities for building an `Atlas` from serialized data.
//!
//! Maps, warps, tilesets and quests come from a single `AtlasDef` RON file.
//! The definition is validated as a whole before anything is built, so a
//! broken atlas fails here and never during stepping.

pub mod atlasdef;

use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use questline_data::AtlasDef;

use crate::atlas::Atlas;
use crate::data_paths::data_path;
use crate::loader::atlasdef::{build_atlas_from_def, load_atlasdef};

/// Load the atlas from `atlas.ron` in the data directory.
///
/// # Errors
/// Errors bubble up from file IO, deserialization, validation or conversion.
pub fn load_atlas() -> Result<Atlas> {
    load_atlas_from(&data_path("atlas.ron"))
}

/// Load, validate and build an atlas from a specific file.
///
/// # Errors
/// Errors bubble up from file IO, deserialization, validation or conversion.
pub fn load_atlas_from(path: &Path) -> Result<Atlas> {
    let def = load_atlasdef(path).context("while loading atlas definition from file")?;
    validate_atlasdef(&def)?;
    let atlas = build_atlas_from_def(&def).context("while building atlas from definition")?;
    info!("atlas \"{}\" v{} loaded", atlas.title, atlas.version);
    info!("{} maps added to Atlas", atlas.maps.len());
    info!("{} warps added to Atlas", atlas.routes.warp_count());
    info!("{} tilesets added to Atlas", atlas.tilesets.len());
    info!("{} route segments added to Atlas", atlas.routes.segment_count());
    info!("{} quests added to Atlas", atlas.quests.len());
    for quest in atlas.quests.iter().filter(|q| q.triggers.is_empty()) {
        warn!("quest {} has no triggers and can only be completed by force", quest.id);
    }
    Ok(atlas)
}

/// Validate the atlas definition and return a single aggregated error.
fn validate_atlasdef(def: &AtlasDef) -> Result<()> {
    let errors = questline_data::validate_atlas(def);
    if errors.is_empty() {
        return Ok(());
    }
    let details = errors
        .into_iter()
        .map(|err| format!("- {err}"))
        .collect::<Vec<_>>()
        .join("\n");
    bail!("atlas validation failed:\n{details}");
}
