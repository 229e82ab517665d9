//! Engine configuration.
//!
//! Settings are read from `questline.toml` in the data directory. A missing or
//! malformed file is not fatal: the engine logs a warning and runs with the
//! built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Tunables shared by every session created from one config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Manhattan distance from the cursor point beyond which the navigator re-snaps.
    pub snap_radius: u32,
    /// Keep triggers satisfied once they have evaluated true.
    pub latch_triggers: bool,
    /// Use the viewport A* search when a viewport is reported.
    pub use_local_pathfinding: bool,
    /// Directory for session snapshots.
    pub snapshot_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snap_radius: 3,
            latch_triggers: true,
            use_local_pathfinding: true,
            snapshot_dir: PathBuf::from("sessions"),
        }
    }
}

/// Load the engine config, falling back to defaults on any error.
///
/// # Logging
/// - `info!` on successful load
/// - `warn!` if the file cannot be read or parsed
pub fn load_config(toml_path: &Path) -> EngineConfig {
    match try_load_config(toml_path) {
        Ok(config) => {
            info!("engine config loaded from '{}'", toml_path.display());
            config
        },
        Err(e) => {
            warn!(
                "Could not load engine config from '{}': {e:#}. Using defaults.",
                toml_path.display()
            );
            EngineConfig::default()
        },
    }
}

/// Load the engine config from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn try_load_config(toml_path: &Path) -> Result<EngineConfig> {
    let text = fs::read_to_string(toml_path)
        .with_context(|| format!("reading engine config from '{}'", toml_path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing engine config from '{}'", toml_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "snap_radius = 6\nlatch_triggers = false").unwrap();
        let config = try_load_config(file.path()).unwrap();
        assert_eq!(config.snap_radius, 6);
        assert!(!config.latch_triggers);
        assert!(config.use_local_pathfinding);
        assert_eq!(config.snapshot_dir, PathBuf::from("sessions"));
    }

    #[test]
    fn unreadable_or_invalid_files_fall_back_to_defaults() {
        assert_eq!(load_config(Path::new("/definitely/not/here.toml")), EngineConfig::default());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "snap_radius = \"far\"").unwrap();
        assert!(try_load_config(file.path()).is_err());
        assert_eq!(load_config(file.path()), EngineConfig::default());
    }
}
