//! Quest module --
//!
//! Quests are totally ordered. Each step the active quest's triggers are checked
//! against the caller's observation; once every trigger is satisfied the quest
//! completes and the first incomplete quest after it becomes active (or
//! `Blocked`, if its prerequisites are not done). Scripted stage rules that
//! filter actions live in [`stage`].

pub mod condition;
pub mod stage;

pub use condition::*;
pub use stage::*;

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::Action;
use crate::atlas::Atlas;
use crate::observation::Observation;

pub type QuestId = String;

/// An ordered objective and the facts that complete it.
#[derive(Debug, Clone)]
pub struct Quest {
    pub id: QuestId,
    pub name: String,
    pub description: String,
    pub prerequisites: Vec<QuestId>,
    pub triggers: Vec<TriggerCondition>,
    pub stage_rules: Vec<StageRule>,
}

/// A quest's trigger, by position in its trigger list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TriggerId {
    pub quest: QuestId,
    pub index: usize,
}

impl TriggerId {
    pub fn new(quest: impl Into<QuestId>, index: usize) -> Self {
        Self {
            quest: quest.into(),
            index,
        }
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.quest, self.index)
    }
}

/// Where the progression currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QuestPhase {
    Active { quest: QuestId },
    Blocked { quest: QuestId, missing: Vec<QuestId> },
    Complete,
}

/// Per-session progression state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestState {
    pub phase: QuestPhase,
    pub satisfied_triggers: BTreeSet<TriggerId>,
    #[serde(default)]
    pub completed_quests: BTreeSet<QuestId>,
    #[serde(default)]
    pub stage_override_active: bool,
    /// Remaining steps of a forced sequence.
    #[serde(default)]
    pub pending_sequence: VecDeque<Action>,
    /// `quest/rule` keys of one-shot rules that already fired.
    #[serde(default)]
    pub fired_rules: BTreeSet<String>,
}

impl QuestState {
    fn starting(phase: QuestPhase) -> Self {
        Self {
            phase,
            satisfied_triggers: BTreeSet::new(),
            completed_quests: BTreeSet::new(),
            stage_override_active: false,
            pending_sequence: VecDeque::new(),
            fired_rules: BTreeSet::new(),
        }
    }

    /// The quest the machine is working on, including a blocked one.
    pub fn active_quest_id(&self) -> Option<&QuestId> {
        match &self.phase {
            QuestPhase::Active { quest } | QuestPhase::Blocked { quest, .. } => Some(quest),
            QuestPhase::Complete => None,
        }
    }

    /// The active quest, only while it is not blocked.
    pub fn navigable_quest(&self) -> Option<&QuestId> {
        match &self.phase {
            QuestPhase::Active { quest } => Some(quest),
            _ => None,
        }
    }
}

/// Notable progression changes from one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    TriggerSatisfied(TriggerId),
    /// Only emitted when triggers are not latched.
    TriggerCleared(TriggerId),
    QuestCompleted(QuestId),
    QuestStarted(QuestId),
    QuestBlocked { quest: QuestId, missing: Vec<QuestId> },
    AllComplete,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::TriggerSatisfied(id) => write!(f, "trigger {id} satisfied"),
            ProgressEvent::TriggerCleared(id) => write!(f, "trigger {id} no longer satisfied"),
            ProgressEvent::QuestCompleted(quest) => write!(f, "quest {quest} completed"),
            ProgressEvent::QuestStarted(quest) => write!(f, "quest {quest} started"),
            ProgressEvent::QuestBlocked { quest, missing } => {
                write!(f, "quest {quest} blocked on {}", missing.join(", "))
            },
            ProgressEvent::AllComplete => f.write_str("all quests complete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestError {
    #[error("unknown quest '{0}'")]
    UnknownQuest(String),
}

/// The quest-progression state machine for one session.
#[derive(Debug, Clone)]
pub struct QuestMachine {
    state: QuestState,
    latch_triggers: bool,
}

impl QuestMachine {
    /// Start at the first quest of the atlas.
    pub fn new(atlas: &Atlas, latch_triggers: bool) -> Self {
        let mut machine = Self {
            state: QuestState::starting(QuestPhase::Complete),
            latch_triggers,
        };
        machine.state.phase = machine.next_phase(atlas);
        info!("quest machine starting in {:?}", machine.state.phase);
        machine
    }

    /// Resume from saved state.
    pub fn with_state(state: QuestState, latch_triggers: bool) -> Self {
        Self { state, latch_triggers }
    }

    pub fn state(&self) -> &QuestState {
        &self.state
    }

    /// Evaluate triggers against this step's observation and advance at most one quest.
    pub fn observe(&mut self, atlas: &Atlas, obs: &Observation) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        let candidates: Vec<QuestId> = match &self.state.phase {
            QuestPhase::Active { quest } => vec![quest.clone()],
            QuestPhase::Blocked { missing, .. } => missing.clone(),
            QuestPhase::Complete => return events,
        };

        let mut any_completed = false;
        for quest_id in candidates {
            let Some(quest) = atlas.quest(&quest_id) else {
                continue;
            };
            if self.evaluate(quest, obs, &mut events) {
                info!("all {} triggers of quest {} satisfied", quest.triggers.len(), quest.id);
                self.state.completed_quests.insert(quest.id.clone());
                events.push(ProgressEvent::QuestCompleted(quest.id.clone()));
                any_completed = true;
            }
        }

        if any_completed {
            self.transition(atlas, &mut events);
        }
        events
    }

    /// Mark a quest complete regardless of its triggers.
    ///
    /// # Errors
    /// Returns `QuestError::UnknownQuest` if the atlas has no such quest.
    pub fn force_complete(&mut self, atlas: &Atlas, quest: &str) -> Result<Vec<ProgressEvent>, QuestError> {
        let quest = atlas
            .quest(quest)
            .ok_or_else(|| QuestError::UnknownQuest(quest.to_string()))?;
        let mut events = Vec::new();
        if self.state.completed_quests.insert(quest.id.clone()) {
            info!("quest {} force-completed", quest.id);
            events.push(ProgressEvent::QuestCompleted(quest.id.clone()));
        }
        self.transition(atlas, &mut events);
        Ok(events)
    }

    /// Forget a quest's completion, trigger latches and fired one-shot rules.
    ///
    /// If the quest precedes the active one it becomes active again.
    ///
    /// # Errors
    /// Returns `QuestError::UnknownQuest` if the atlas has no such quest.
    pub fn reset_quest(&mut self, atlas: &Atlas, quest: &str) -> Result<Vec<ProgressEvent>, QuestError> {
        let quest = atlas
            .quest(quest)
            .ok_or_else(|| QuestError::UnknownQuest(quest.to_string()))?;
        info!("quest {} reset", quest.id);
        self.state.completed_quests.remove(&quest.id);
        self.state.satisfied_triggers.retain(|id| id.quest != quest.id);
        let prefix = format!("{}/", quest.id);
        self.state.fired_rules.retain(|key| !key.starts_with(&prefix));
        let mut events = Vec::new();
        self.transition(atlas, &mut events);
        Ok(events)
    }

    /// Update trigger latches for one quest and report whether all of them hold.
    ///
    /// A quest without triggers never completes on its own.
    fn evaluate(&mut self, quest: &Quest, obs: &Observation, events: &mut Vec<ProgressEvent>) -> bool {
        if quest.triggers.is_empty() {
            return false;
        }
        let state = &mut self.state;
        for (index, condition) in quest.triggers.iter().enumerate() {
            let id = TriggerId::new(quest.id.clone(), index);
            if condition.is_satisfied(obs, &state.completed_quests) {
                if state.satisfied_triggers.insert(id.clone()) {
                    debug!("trigger {id} satisfied");
                    events.push(ProgressEvent::TriggerSatisfied(id));
                }
            } else if !self.latch_triggers && state.satisfied_triggers.remove(&id) {
                debug!("trigger {id} cleared");
                events.push(ProgressEvent::TriggerCleared(id));
            }
        }
        (0..quest.triggers.len()).all(|index| {
            state
                .satisfied_triggers
                .contains(&TriggerId::new(quest.id.clone(), index))
        })
    }

    /// Move to the phase implied by the completed set, emitting an event if it changed.
    fn transition(&mut self, atlas: &Atlas, events: &mut Vec<ProgressEvent>) {
        let next = self.next_phase(atlas);
        if next == self.state.phase {
            return;
        }
        let quest_changed = self.state.active_quest_id() != next_quest(&next);
        match &next {
            QuestPhase::Active { quest } => {
                info!("quest {quest} is now active");
                events.push(ProgressEvent::QuestStarted(quest.clone()));
            },
            QuestPhase::Blocked { quest, missing } => {
                info!("quest {quest} blocked: prerequisites {} incomplete", missing.join(", "));
                events.push(ProgressEvent::QuestBlocked {
                    quest: quest.clone(),
                    missing: missing.clone(),
                });
            },
            QuestPhase::Complete => {
                info!("every quest is complete");
                events.push(ProgressEvent::AllComplete);
            },
        }
        if quest_changed {
            self.state.pending_sequence.clear();
            self.state.stage_override_active = false;
        }
        self.state.phase = next;
    }

    /// First incomplete quest in atlas order, checked against its prerequisites.
    fn next_phase(&self, atlas: &Atlas) -> QuestPhase {
        let completed = &self.state.completed_quests;
        let Some(quest) = atlas.quests.iter().find(|q| !completed.contains(&q.id)) else {
            return QuestPhase::Complete;
        };
        let missing: Vec<QuestId> = quest
            .prerequisites
            .iter()
            .filter(|p| !completed.contains(*p))
            .cloned()
            .collect();
        if missing.is_empty() {
            QuestPhase::Active {
                quest: quest.id.clone(),
            }
        } else {
            QuestPhase::Blocked {
                quest: quest.id.clone(),
                missing,
            }
        }
    }
}

fn next_quest(phase: &QuestPhase) -> Option<&QuestId> {
    match phase {
        QuestPhase::Active { quest } | QuestPhase::Blocked { quest, .. } => Some(quest),
        QuestPhase::Complete => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::test_support::{self, TOWN};
    use crate::coords::GlobalCoord;

    fn at_town() -> Observation {
        Observation::at(GlobalCoord::new(TOWN, 25, 25))
    }

    #[test]
    fn starts_on_first_quest() {
        let atlas = test_support::atlas();
        let machine = QuestMachine::new(&atlas, true);
        assert_eq!(machine.state().active_quest_id().map(String::as_str), Some("001"));
    }

    #[test]
    fn partial_satisfaction_does_not_advance() {
        let atlas = test_support::atlas();
        let mut machine = QuestMachine::new(&atlas, true);
        // Quest 001 needs both flags.
        let events = machine.observe(&atlas, &at_town().with_flag("woke_up"));
        assert_eq!(events, vec![ProgressEvent::TriggerSatisfied(TriggerId::new("001", 0))]);
        assert_eq!(machine.state().active_quest_id().map(String::as_str), Some("001"));
    }

    #[test]
    fn latched_triggers_accumulate_across_steps() {
        let atlas = test_support::atlas();
        let mut machine = QuestMachine::new(&atlas, true);
        machine.observe(&atlas, &at_town().with_flag("woke_up"));
        let events = machine.observe(&atlas, &at_town().with_flag("left_house"));
        assert!(events.contains(&ProgressEvent::QuestCompleted("001".into())));
        assert!(events.contains(&ProgressEvent::QuestStarted("002".into())));
    }

    #[test]
    fn unlatched_triggers_must_hold_together() {
        let atlas = test_support::atlas();
        let mut machine = QuestMachine::new(&atlas, false);
        machine.observe(&atlas, &at_town().with_flag("woke_up"));
        let events = machine.observe(&atlas, &at_town().with_flag("left_house"));
        assert!(events.contains(&ProgressEvent::TriggerCleared(TriggerId::new("001", 0))));
        assert_eq!(machine.state().active_quest_id().map(String::as_str), Some("001"));

        machine.observe(&atlas, &at_town().with_flag("woke_up").with_flag("left_house"));
        assert_eq!(machine.state().active_quest_id().map(String::as_str), Some("002"));
    }

    #[test]
    fn only_one_quest_advances_per_observation() {
        let atlas = test_support::atlas();
        let mut machine = QuestMachine::new(&atlas, true);
        // Satisfies 001 and would satisfy 002 as well.
        let obs = at_town()
            .with_flag("woke_up")
            .with_flag("left_house")
            .with_item("parcel", 1);
        machine.observe(&atlas, &obs);
        assert_eq!(machine.state().active_quest_id().map(String::as_str), Some("002"));
        machine.observe(&atlas, &obs);
        assert_eq!(machine.state().active_quest_id().map(String::as_str), Some("003"));
    }

    #[test]
    fn unmet_prerequisites_block_until_completed() {
        let atlas = test_support::atlas();
        let mut machine = QuestMachine::new(&atlas, true);
        machine.force_complete(&atlas, "001").unwrap();
        machine.force_complete(&atlas, "002").unwrap();
        // 003 requires 004, which comes later in the atlas.
        assert_eq!(
            machine.state().phase,
            QuestPhase::Blocked {
                quest: "003".into(),
                missing: vec!["004".into()]
            }
        );
        let events = machine.observe(&atlas, &at_town().with_flag("met_rival"));
        assert!(events.contains(&ProgressEvent::QuestCompleted("004".into())));
        assert!(events.contains(&ProgressEvent::QuestStarted("003".into())));
    }

    #[test]
    fn reset_quest_reactivates_earlier_quest() {
        let atlas = test_support::atlas();
        let mut machine = QuestMachine::new(&atlas, true);
        machine.observe(&atlas, &at_town().with_flag("woke_up").with_flag("left_house"));
        assert_eq!(machine.state().active_quest_id().map(String::as_str), Some("002"));

        let events = machine.reset_quest(&atlas, "001").unwrap();
        assert_eq!(events, vec![ProgressEvent::QuestStarted("001".into())]);
        assert!(machine.state().satisfied_triggers.is_empty());
        assert_eq!(
            machine.reset_quest(&atlas, "nope"),
            Err(QuestError::UnknownQuest("nope".into()))
        );
    }

    #[test]
    fn completing_everything_reaches_complete() {
        let atlas = test_support::atlas();
        let mut machine = QuestMachine::new(&atlas, true);
        for quest in ["001", "002", "004", "003"] {
            machine.force_complete(&atlas, quest).unwrap();
        }
        assert_eq!(machine.state().phase, QuestPhase::Complete);
        assert!(machine.observe(&atlas, &at_town()).is_empty());
    }
}
