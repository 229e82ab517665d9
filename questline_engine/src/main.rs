#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Questline **
//! Replays recorded traces through the engine and manages session snapshots.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;

use questline_engine::data_paths::data_path;
use questline_engine::save_files::{
    SnapshotStatus, build_snapshot_entries, format_modified, load_snapshot, snapshot_dir_for_atlas, write_snapshot,
};
use questline_engine::trace::load_trace;
use questline_engine::{Atlas, DecisionSource, EngineConfig, ProgressEvent, Session, load_atlas_from, load_config};

#[derive(Parser)]
#[command(author, version, about = "Route following and quest progression for tile-based worlds.")]
struct Cli {
    /// Atlas file (defaults to `atlas.ron` in the data directory).
    #[arg(long, global = true)]
    atlas: Option<PathBuf>,
    /// Engine config (defaults to `questline.toml` in the data directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the atlas, then print a summary.
    Check,
    /// Feed a recorded trace through a session and print each decision.
    Replay {
        trace: PathBuf,
        /// Resume from a snapshot file instead of starting fresh.
        #[arg(long)]
        resume: Option<PathBuf>,
        /// Save the final session state under this slot name.
        #[arg(long)]
        save: Option<String>,
    },
    /// List saved session snapshots for the atlas.
    Saves,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = load_config(&cli.config.unwrap_or_else(|| data_path("questline.toml")));
    let atlas_path = cli.atlas.unwrap_or_else(|| data_path("atlas.ron"));
    info!("Start: loading atlas from '{}'", atlas_path.display());
    let atlas = Arc::new(load_atlas_from(&atlas_path).context("while loading atlas")?);

    match cli.command {
        Commands::Check => check(&atlas),
        Commands::Replay { trace, resume, save } => replay(atlas, &config, &trace, resume.as_deref(), save.as_deref()),
        Commands::Saves => saves(&atlas, &config),
    }
}

fn check(atlas: &Atlas) -> Result<()> {
    println!("{} {}", atlas.title.bright_yellow().bold(), atlas.version.dimmed());
    println!(
        "{} maps, {} warps, {} route segments, {} tilesets",
        atlas.maps.len(),
        atlas.routes.warp_count(),
        atlas.routes.segment_count(),
        atlas.tilesets.len()
    );
    for (idx, quest) in atlas.quests.iter().enumerate() {
        let segments = atlas.routes.routes_for_quest(&quest.id).count();
        println!(
            "{:>3}. {} {} ({} triggers, {} segments, {} rules)",
            idx + 1,
            quest.id.bright_blue(),
            quest.name,
            quest.triggers.len(),
            segments,
            quest.stage_rules.len()
        );
    }
    Ok(())
}

fn replay(
    atlas: Arc<Atlas>,
    config: &EngineConfig,
    trace_path: &Path,
    resume: Option<&Path>,
    save: Option<&str>,
) -> Result<()> {
    let trace = load_trace(trace_path)?;
    let mut session = match resume {
        Some(path) => {
            let snapshot = load_snapshot(path)?;
            Session::resume(Arc::clone(&atlas), config, snapshot).context("while resuming session")?
        },
        None => Session::new(Arc::clone(&atlas), config),
    };
    println!("{} {} ({} steps)", "replaying".bright_yellow(), trace.name.bold(), trace.steps.len());

    for (idx, step) in trace.steps.iter().enumerate() {
        let obs = step
            .to_observation(&atlas.maps)
            .with_context(|| format!("in trace step {}", idx + 1))?;
        let outcome = session.step(step.request, &obs);
        for event in &outcome.events {
            let line = event.to_string();
            match event {
                ProgressEvent::QuestCompleted(_) | ProgressEvent::AllComplete => println!("      {}", line.bright_green()),
                ProgressEvent::QuestBlocked { .. } => println!("      {}", line.bright_red()),
                _ => println!("      {}", line.dimmed()),
            }
        }
        let source = match &outcome.decision.source {
            DecisionSource::Navigator => "navigator".cyan(),
            DecisionSource::StageRule(name) => format!("rule '{name}'").magenta(),
            DecisionSource::ForcedSequence => "forced sequence".magenta(),
            DecisionSource::Modal => "modal".yellow(),
            DecisionSource::Requested => "requested".normal(),
            DecisionSource::Blocked => "blocked".red(),
            DecisionSource::Complete => "complete".green(),
            DecisionSource::Fallback(err) => format!("fallback: {err}").red(),
        };
        println!(
            "{:>4} {} -> {} [{}]",
            idx + 1,
            obs.position,
            outcome.decision.action.to_string().bold(),
            source
        );
    }

    let snapshot = session.snapshot();
    match snapshot.active_quest() {
        Some(quest) => println!("active quest: {}", quest.bright_blue()),
        None => println!("{}", "all quests complete".bright_green()),
    }
    if let Some(slot) = save {
        let dir = snapshot_dir_for_atlas(&config.snapshot_dir, &atlas.title);
        let path = write_snapshot(&dir, slot, &snapshot)?;
        println!("saved to {}", path.display());
    }
    Ok(())
}

fn saves(atlas: &Atlas, config: &EngineConfig) -> Result<()> {
    let dir = snapshot_dir_for_atlas(&config.snapshot_dir, &atlas.title);
    let entries = build_snapshot_entries(&dir)?;
    if entries.is_empty() {
        println!("no snapshots in {}", dir.display());
        return Ok(());
    }
    for entry in entries {
        let age = entry.slot.modified.map(format_modified).unwrap_or_default();
        let status = match &entry.status {
            SnapshotStatus::Ready => "ready".green(),
            SnapshotStatus::VersionMismatch { saved_version, .. } => format!("engine {saved_version}").yellow(),
            SnapshotStatus::Corrupted { message } => format!("corrupted: {message}").red(),
        };
        let detail = entry
            .summary
            .map(|s| {
                format!(
                    "quest {} | {} done | {} steps",
                    s.active_quest.as_deref().unwrap_or("-"),
                    s.completed,
                    s.steps
                )
            })
            .unwrap_or_default();
        println!("{:<16} {:<10} {:<24} {}", entry.slot.slot.bold(), age, status, detail);
    }
    Ok(())
}
