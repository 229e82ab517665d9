//! Session snapshot discovery and serialization helpers.
//!
//! Snapshots live in one directory per atlas, one RON file per slot, named
//! `<slot>-questline-<engine version>.ron`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::QUESTLINE_VERSION;
use crate::session::SessionSnapshot;
use crate::slug::sanitize_slug;

const FILE_MARKER: &str = "-questline-";

/// A snapshot file found on disk, before it has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSlot {
    pub slot: String,
    pub version: String,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// What a readable snapshot contains, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub atlas_title: String,
    pub active_quest: Option<String>,
    pub completed: usize,
    pub steps: u64,
    pub saved_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    Ready,
    VersionMismatch { saved_version: String, current_version: String },
    Corrupted { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub slot: SnapshotSlot,
    pub summary: Option<SnapshotSummary>,
    pub status: SnapshotStatus,
}

/// Snapshot directory for an atlas under `root`.
pub fn snapshot_dir_for_atlas(root: &Path, atlas_title: &str) -> PathBuf {
    root.join(sanitize_slug(atlas_title))
}

/// Path a slot is written to by this engine version.
pub fn snapshot_path(dir: &Path, slot: &str) -> PathBuf {
    dir.join(format!("{}{FILE_MARKER}{QUESTLINE_VERSION}.ron", sanitize_slug(slot)))
}

/// Write a snapshot to `dir`, creating the directory if needed.
///
/// # Errors
/// Returns an error if the directory cannot be created or the file cannot be written.
pub fn write_snapshot(dir: &Path, slot: &str, snapshot: &SessionSnapshot) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating snapshot directory {}", dir.display()))?;
    let path = snapshot_path(dir, slot);
    let text = ron::ser::to_string_pretty(snapshot, ron::ser::PrettyConfig::default())
        .context("serializing session snapshot")?;
    fs::write(&path, text).with_context(|| format!("writing snapshot {}", path.display()))?;
    info!("session {} saved to {}", snapshot.session_id, path.display());
    Ok(path)
}

/// Read a snapshot file.
///
/// # Errors
/// Returns an error if the file cannot be read or deserialized.
pub fn load_snapshot(path: &Path) -> Result<SessionSnapshot> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading snapshot {}", path.display()))?;
    ron::from_str(&raw).with_context(|| format!("parsing snapshot {}", path.display()))
}

/// Find snapshot files in `dir`, sorted by slot then version.
///
/// # Errors
/// Returns an error if the directory contents cannot be read.
pub fn collect_snapshot_slots(dir: &Path) -> Result<Vec<SnapshotSlot>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut slots = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry.with_context(|| format!("enumerating {}", dir.display()))?;
        if let Some(slot) = slot_from_entry(&entry) {
            slots.push(slot);
        }
    }
    slots.sort_by(|a, b| a.slot.cmp(&b.slot).then(a.version.cmp(&b.version)));
    Ok(slots)
}

/// Describe every snapshot in `dir`, most recently modified first.
///
/// # Errors
/// Returns an error if the directory contents cannot be read.
pub fn build_snapshot_entries(dir: &Path) -> Result<Vec<SnapshotEntry>> {
    let mut entries: Vec<_> = collect_snapshot_slots(dir)?.into_iter().map(entry_for_slot).collect();
    entries.sort_by(|a, b| b.slot.modified.cmp(&a.slot.modified).then(a.slot.slot.cmp(&b.slot.slot)));
    Ok(entries)
}

/// A compact "time ago" label for a modification time.
pub fn format_modified(modified: SystemTime) -> String {
    match SystemTime::now().duration_since(modified) {
        Ok(delta) => format_duration(delta),
        Err(_) => "in the future".to_string(),
    }
}

fn entry_for_slot(slot: SnapshotSlot) -> SnapshotEntry {
    let (summary, status) = match load_snapshot(&slot.path) {
        Ok(snapshot) => {
            let status = if snapshot.engine_version == QUESTLINE_VERSION {
                SnapshotStatus::Ready
            } else {
                SnapshotStatus::VersionMismatch {
                    saved_version: snapshot.engine_version.clone(),
                    current_version: QUESTLINE_VERSION.to_string(),
                }
            };
            let summary = SnapshotSummary {
                atlas_title: snapshot.atlas_title.clone(),
                active_quest: snapshot.active_quest().map(ToString::to_string),
                completed: snapshot.quest.completed_quests.len(),
                steps: snapshot.steps,
                saved_at: snapshot.saved_at,
            };
            (Some(summary), status)
        },
        Err(err) => {
            warn!("unreadable snapshot '{}' ({}): {err:#}", slot.slot, slot.path.display());
            (
                None,
                SnapshotStatus::Corrupted {
                    message: trim_error(&format!("{err:#}")),
                },
            )
        },
    };
    SnapshotEntry { slot, summary, status }
}

fn slot_from_entry(entry: &fs::DirEntry) -> Option<SnapshotSlot> {
    let path = entry.path();
    if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("ron") {
        return None;
    }
    let stem = path.file_stem().and_then(|stem| stem.to_str())?;
    let (slot, version) = stem.rsplit_once(FILE_MARKER)?;
    if slot.is_empty() {
        return None;
    }
    let modified = entry.metadata().ok().and_then(|meta| meta.modified().ok());
    Some(SnapshotSlot {
        slot: slot.to_string(),
        version: version.to_string(),
        path,
        modified,
    })
}

fn format_duration(duration: Duration) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = MINUTE * 60;
    const DAY: u64 = HOUR * 24;
    const WEEK: u64 = DAY * 7;

    let secs = duration.as_secs();
    if secs < 30 {
        "just now".to_string()
    } else if secs < MINUTE {
        format!("{secs}s ago")
    } else if secs < HOUR {
        format!("{}m ago", secs / MINUTE)
    } else if secs < DAY {
        format!("{}h ago", secs / HOUR)
    } else if secs < WEEK {
        format!("{}d ago", secs / DAY)
    } else {
        format!("{}w ago", secs / WEEK)
    }
}

/// Clamp long error text to 120 characters.
fn trim_error(message: &str) -> String {
    if message.chars().count() <= 120 {
        return message.to_string();
    }
    let mut trimmed: String = message.chars().take(117).collect();
    trimmed.push_str("...");
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::test_support;
    use crate::config::EngineConfig;
    use crate::session::Session;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn snapshot() -> SessionSnapshot {
        Session::new(Arc::new(test_support::atlas()), &EngineConfig::default()).snapshot()
    }

    #[test]
    fn missing_directory_has_no_slots() -> Result<()> {
        let dir = tempdir()?;
        assert!(collect_snapshot_slots(&dir.path().join("nope"))?.is_empty());
        Ok(())
    }

    #[test]
    fn write_then_load_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let snap = snapshot();
        let path = write_snapshot(dir.path(), "Morning Run", &snap)?;
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(format!("morning-run-questline-{QUESTLINE_VERSION}.ron").as_str())
        );
        assert_eq!(load_snapshot(&path)?, snap);
        Ok(())
    }

    #[test]
    fn entries_report_each_status() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path();
        write_snapshot(path, "alpha", &snapshot())?;

        let mut old = snapshot();
        old.engine_version = "0.0.1".into();
        let text = ron::ser::to_string(&old)?;
        fs::write(path.join("beta-questline-0.0.1.ron"), text)?;
        fs::write(path.join("gamma-questline-0.0.1.ron"), "not ron at all")?;
        fs::write(path.join("notes.txt"), "ignored")?;

        let entries = build_snapshot_entries(path)?;
        assert_eq!(entries.len(), 3);
        let find = |slot: &str| entries.iter().find(|e| e.slot.slot == slot).unwrap();

        let alpha = find("alpha");
        assert_eq!(alpha.status, SnapshotStatus::Ready);
        assert_eq!(alpha.summary.as_ref().and_then(|s| s.active_quest.clone()), Some("001".into()));
        assert!(matches!(find("beta").status, SnapshotStatus::VersionMismatch { .. }));
        assert!(matches!(find("gamma").status, SnapshotStatus::Corrupted { .. }));
        assert!(find("gamma").summary.is_none());
        Ok(())
    }

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration(Duration::from_secs(5)), "just now");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m ago");
        assert_eq!(format_duration(Duration::from_secs(3 * 86_400)), "3d ago");
        assert_eq!(trim_error(&"x".repeat(200)).chars().count(), 120);
    }
}
