//! Locating the atlas, config and trace files at runtime.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Environment variable that overrides data directory detection.
pub const DATA_DIR_VAR: &str = "QUESTLINE_DATA";

static DATA_ROOT: LazyLock<PathBuf> = LazyLock::new(detect_data_root);

/// A path under the resolved data directory.
pub fn data_path(relative: impl AsRef<Path>) -> PathBuf {
    DATA_ROOT.join(relative)
}

fn detect_data_root() -> PathBuf {
    if let Some(dir) = env::var_os(DATA_DIR_VAR).map(PathBuf::from)
        && dir.is_dir()
    {
        return dir;
    }

    let mut candidates = vec![PathBuf::from("questline_engine/data"), PathBuf::from("data")];
    if let Ok(exe_path) = env::current_exe()
        && let Some(dir) = exe_path.parent()
    {
        candidates.push(dir.join("data"));
        // target/<profile>/questline -> workspace root
        for ancestor in dir.ancestors().skip(1).take(2) {
            candidates.push(ancestor.join("questline_engine/data"));
        }
    }

    candidates
        .into_iter()
        .find(|candidate| candidate.is_dir())
        .unwrap_or_else(|| PathBuf::from("questline_engine/data"))
}
