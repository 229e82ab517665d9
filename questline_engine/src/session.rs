//! session.rs -- one agent's navigation and quest state
//!
//! A `Session` pairs a `Navigator` and a `QuestMachine` over a shared,
//! read-only `Atlas`. Sessions never share mutable state, so any number of
//! them can run side by side over one `Arc<Atlas>`.
//!
//! Per step the caller reports what happened (`observe`) and asks what to do
//! next (`decide`); `step` does both in that order.

use std::sync::Arc;

use anyhow::{Result, bail};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::QUESTLINE_VERSION;
use crate::action::{Action, Decision};
use crate::atlas::Atlas;
use crate::config::EngineConfig;
use crate::coords::{GlobalCoord, LocalCoord, MapId, UnknownMapError};
use crate::navigator::{Navigator, NavigatorState};
use crate::observation::Observation;
use crate::quest::{ProgressEvent, QuestError, QuestMachine, QuestPhase, QuestState};

/// Serializable session state, sufficient to resume exactly where it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub engine_version: String,
    pub atlas_title: String,
    /// RFC 3339 timestamp.
    pub saved_at: String,
    #[serde(default)]
    pub steps: u64,
    pub quest: QuestState,
    pub navigator: NavigatorState,
}

impl SessionSnapshot {
    pub fn active_quest(&self) -> Option<&str> {
        self.quest.active_quest_id().map(String::as_str)
    }
}

/// Everything produced by one `step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub events: Vec<ProgressEvent>,
    pub decision: Decision,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    atlas: Arc<Atlas>,
    navigator: Navigator,
    quests: QuestMachine,
    steps: u64,
}

impl Session {
    /// Start a fresh session on the first quest, with its first route loaded.
    pub fn new(atlas: Arc<Atlas>, config: &EngineConfig) -> Self {
        let quests = QuestMachine::new(&atlas, config.latch_triggers);
        let mut navigator = Navigator::new(config);
        let first = quests.state().navigable_quest().and_then(|q| atlas.routes.first_route(q));
        navigator.reset_route(first);
        let id = Uuid::new_v4();
        info!("session {id} started on atlas \"{}\"", atlas.title);
        Self {
            id,
            atlas,
            navigator,
            quests,
            steps: 0,
        }
    }

    /// Rebuild a session from a snapshot.
    ///
    /// # Errors
    /// Fails if the snapshot names quests the atlas does not define.
    pub fn resume(atlas: Arc<Atlas>, config: &EngineConfig, snapshot: SessionSnapshot) -> Result<Self> {
        if snapshot.engine_version != QUESTLINE_VERSION {
            warn!(
                "snapshot written by engine {} (running {QUESTLINE_VERSION})",
                snapshot.engine_version
            );
        }
        if snapshot.atlas_title != atlas.title {
            warn!(
                "snapshot was taken on atlas \"{}\", resuming on \"{}\"",
                snapshot.atlas_title, atlas.title
            );
        }
        let quest = &snapshot.quest;
        let named = quest
            .active_quest_id()
            .into_iter()
            .chain(&quest.completed_quests)
            .chain(quest.satisfied_triggers.iter().map(|t| &t.quest));
        for id in named {
            if atlas.quest(id).is_none() {
                bail!("snapshot refers to unknown quest '{id}'");
            }
        }

        let mut nav_state = snapshot.navigator;
        if let Some(key) = &nav_state.active_route
            && atlas.routes.get(key).is_none()
        {
            warn!(
                "snapshot route for quest {} on {} no longer exists; clearing it",
                key.quest, key.map
            );
            nav_state.active_route = None;
            nav_state.cursor = None;
        }

        info!("session {} resumed at step {}", snapshot.session_id, snapshot.steps);
        Ok(Self {
            id: snapshot.session_id,
            atlas,
            navigator: Navigator::with_state(nav_state, config),
            quests: QuestMachine::with_state(snapshot.quest, config.latch_triggers),
            steps: snapshot.steps,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn quest_state(&self) -> &QuestState {
        self.quests.state()
    }

    pub fn navigator_state(&self) -> &NavigatorState {
        self.navigator.state()
    }

    /// Apply the state reported after the last executed action.
    ///
    /// Navigation state is left alone while a modal context is open. When the
    /// active quest changes, the navigator is reset to the new quest's first route.
    pub fn observe(&mut self, obs: &Observation) -> Vec<ProgressEvent> {
        if !obs.modal.is_active()
            && let Some(quest) = self.quests.state().navigable_quest()
        {
            self.navigator.observe(&self.atlas.routes, quest, obs.position);
        }

        let before = self.quests.state().phase.clone();
        let events = self.quests.observe(&self.atlas, obs);
        self.sync_route(&before);
        events
    }

    /// Decide the action to execute for this step.
    pub fn decide(&mut self, request: Action, obs: &Observation) -> Decision {
        self.quests.decide(&self.atlas, &mut self.navigator, request, obs)
    }

    /// `observe` then `decide`.
    pub fn step(&mut self, request: Action, obs: &Observation) -> StepOutcome {
        self.steps += 1;
        let events = self.observe(obs);
        let decision = self.decide(request, obs);
        StepOutcome { events, decision }
    }

    /// Mark a quest complete by hand.
    ///
    /// # Errors
    /// Returns `QuestError::UnknownQuest` for an id the atlas does not define.
    pub fn force_complete(&mut self, quest: &str) -> Result<Vec<ProgressEvent>, QuestError> {
        let before = self.quests.state().phase.clone();
        let events = self.quests.force_complete(&self.atlas, quest)?;
        self.sync_route(&before);
        Ok(events)
    }

    /// Forget a quest's progress.
    ///
    /// # Errors
    /// Returns `QuestError::UnknownQuest` for an id the atlas does not define.
    pub fn reset_quest(&mut self, quest: &str) -> Result<Vec<ProgressEvent>, QuestError> {
        let before = self.quests.state().phase.clone();
        let events = self.quests.reset_quest(&self.atlas, quest)?;
        self.sync_route(&before);
        Ok(events)
    }

    /// Capture the session state for persistence.
    pub fn snapshot(&self) -> SessionSnapshot {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        SessionSnapshot {
            session_id: self.id,
            engine_version: QUESTLINE_VERSION.to_string(),
            atlas_title: self.atlas.title.clone(),
            saved_at: now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string()),
            steps: self.steps,
            quest: self.quests.state().clone(),
            navigator: self.navigator.state().clone(),
        }
    }

    /// Convert a map-relative position reported by the caller into a global one.
    ///
    /// # Errors
    /// Returns `UnknownMapError` if the map is not in the atlas.
    pub fn locate(&self, map: MapId, local: LocalCoord) -> Result<GlobalCoord, UnknownMapError> {
        self.atlas.maps.to_global(map, local)
    }

    /// Reset the navigator when the active quest (or its blocked status) changed.
    fn sync_route(&mut self, before: &QuestPhase) {
        let state = self.quests.state();
        if &state.phase == before {
            return;
        }
        let quest_changed = phase_quest(before) != state.active_quest_id();
        let unblocked = matches!(before, QuestPhase::Blocked { .. }) && matches!(state.phase, QuestPhase::Active { .. });
        if quest_changed || unblocked {
            let route = state.navigable_quest().and_then(|q| self.atlas.routes.first_route(q));
            self.navigator.reset_route(route);
        }
    }
}

fn phase_quest(phase: &QuestPhase) -> Option<&String> {
    match phase {
        QuestPhase::Active { quest } | QuestPhase::Blocked { quest, .. } => Some(quest),
        QuestPhase::Complete => None,
    }
}
