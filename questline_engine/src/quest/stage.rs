//! Scripted stage rules and the per-step action filter.
//!
//! Rules belong to a quest and are only consulted while it is active. Each has a
//! list of conditions (all must hold) and one effect. The filter runs in a fixed
//! order:
//!
//! 1. modal context: the request passes through and nothing is touched
//! 2. the next step of a pending forced sequence
//! 3. `PassThrough` rules
//! 4. `Substitute` rules, judged against the requested action
//! 5. `ForcedSequence` rules
//! 6. the navigator, for `FollowRoute` requests, with `Substitute` rules
//!    judged again against the move it proposes
//!
//! Within one tier rules fire in declaration order. Navigation errors fall back
//! to the caller's request.

use log::{debug, info};

use crate::action::{Action, Decision, DecisionSource};
use crate::atlas::Atlas;
use crate::coords::{Direction, GlobalCoord, MapId};
use crate::navigator::Navigator;
use crate::observation::Observation;
use crate::quest::{QuestMachine, QuestPhase};

/// A side of a map.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Edge {
    North,
    South,
    East,
    West,
}

impl Edge {
    pub fn direction(self) -> Direction {
        match self {
            Edge::North => Direction::Up,
            Edge::South => Direction::Down,
            Edge::East => Direction::Right,
            Edge::West => Direction::Left,
        }
    }
}

impl From<questline_data::EdgeDef> for Edge {
    fn from(def: questline_data::EdgeDef) -> Self {
        match def {
            questline_data::EdgeDef::North => Edge::North,
            questline_data::EdgeDef::South => Edge::South,
            questline_data::EdgeDef::East => Edge::East,
            questline_data::EdgeDef::West => Edge::West,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleCondition {
    At(GlobalCoord),
    InMap(MapId),
    HasItem(String),
    MissingItem(String),
    FlagSet(String),
    FlagClear(String),
    /// The candidate move lands on (or presses through) a warp, optionally one leading to this map.
    EntersWarp { to: Option<MapId> },
    /// The candidate move leaves the current map across this edge.
    CrossesEdge(Edge),
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEffect {
    PassThrough,
    Substitute(Action),
    ForcedSequence(Vec<Action>),
}

impl RuleEffect {
    fn tier(&self) -> u8 {
        match self {
            RuleEffect::PassThrough => 0,
            RuleEffect::Substitute(_) => 1,
            RuleEffect::ForcedSequence(_) => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRule {
    pub name: String,
    pub conditions: Vec<RuleCondition>,
    pub effect: RuleEffect,
    pub only_once: bool,
}

impl RuleCondition {
    /// `candidate` is the direction of the move under consideration, if any.
    pub fn holds(&self, atlas: &Atlas, obs: &Observation, candidate: Option<Direction>) -> bool {
        let here = &obs.position;
        match self {
            RuleCondition::At(at) => here == at,
            RuleCondition::InMap(map) => here.map == *map,
            RuleCondition::HasItem(item) => obs.item_count(item) > 0,
            RuleCondition::MissingItem(item) => obs.item_count(item) == 0,
            RuleCondition::FlagSet(flag) => obs.has_flag(flag),
            RuleCondition::FlagClear(flag) => !obs.has_flag(flag),
            RuleCondition::EntersWarp { to } => {
                let Some(direction) = candidate else {
                    return false;
                };
                let leads = |dest: MapId| to.is_none_or(|wanted| wanted == dest);
                let stepped_on = atlas
                    .routes
                    .warp_at(&here.step(direction))
                    .is_some_and(|warp| leads(warp.destination));
                let pressed_through = atlas
                    .routes
                    .warp_at(here)
                    .is_some_and(|warp| warp.exit == Some(direction) && leads(warp.destination));
                stepped_on || pressed_through
            },
            RuleCondition::CrossesEdge(edge) => {
                let Some(direction) = candidate else {
                    return false;
                };
                if direction != edge.direction() {
                    return false;
                }
                let Some(info) = atlas.maps.get(here.map) else {
                    return false;
                };
                let next = here.step(direction);
                match edge {
                    Edge::North => next.row < info.top(),
                    Edge::South => next.row >= info.bottom(),
                    Edge::West => next.col < info.left(),
                    Edge::East => next.col >= info.right(),
                }
            },
            RuleCondition::Always => true,
        }
    }
}

impl StageRule {
    pub fn matches(&self, atlas: &Atlas, obs: &Observation, candidate: Option<Direction>) -> bool {
        self.conditions.iter().all(|c| c.holds(atlas, obs, candidate))
    }
}

impl QuestMachine {
    /// Filter or override the caller's request for this step.
    ///
    /// Delegates `FollowRoute` requests to `navigator`. Never fails: any
    /// navigation error returns the request unchanged.
    pub fn decide(&mut self, atlas: &Atlas, navigator: &mut Navigator, request: Action, obs: &Observation) -> Decision {
        if obs.modal.is_active() {
            debug!("{:?} open: passing {request} through", obs.modal);
            return Decision::new(request, DecisionSource::Modal);
        }

        let quest_id = match &self.state.phase {
            QuestPhase::Active { quest } => quest.clone(),
            QuestPhase::Blocked { .. } => {
                self.state.stage_override_active = false;
                return Decision::new(request, DecisionSource::Blocked);
            },
            QuestPhase::Complete => {
                self.state.stage_override_active = false;
                return Decision::new(request, DecisionSource::Complete);
            },
        };

        if let Some(next) = self.state.pending_sequence.pop_front() {
            self.state.stage_override_active = true;
            debug!("forced sequence: {next} ({} left)", self.state.pending_sequence.len());
            return Decision::new(next, DecisionSource::ForcedSequence);
        }

        let Some(quest) = atlas.quest(&quest_id) else {
            return Decision::new(request, DecisionSource::Requested);
        };
        let rules = quest.stage_rules.as_slice();
        let requested = request.walk();

        for tier in 0..=2 {
            let Some(rule) = self.matching_rule(rules, tier, atlas, obs, requested) else {
                continue;
            };
            self.fire(&quest_id, rule);
            let action = match &rule.effect {
                RuleEffect::PassThrough => request,
                RuleEffect::Substitute(action) => *action,
                RuleEffect::ForcedSequence(actions) => {
                    let mut queue: std::collections::VecDeque<Action> = actions.iter().copied().collect();
                    let first = queue.pop_front().unwrap_or(request);
                    self.state.pending_sequence = queue;
                    first
                },
            };
            return Decision::new(action, DecisionSource::StageRule(rule.name.clone()));
        }

        self.state.stage_override_active = false;
        if !request.is_follow_route() {
            return Decision::new(request, DecisionSource::Requested);
        }

        match navigator.next_action(atlas, &quest_id, obs.position, obs.viewport.as_ref()) {
            Ok(action) => {
                if let Some(direction) = action.walk()
                    && let Some(rule) = self.matching_rule(rules, 1, atlas, obs, Some(direction))
                {
                    self.fire(&quest_id, rule);
                    if let RuleEffect::Substitute(substitute) = &rule.effect {
                        return Decision::new(*substitute, DecisionSource::StageRule(rule.name.clone()));
                    }
                }
                Decision::new(action, DecisionSource::Navigator)
            },
            Err(err) => {
                info!("navigation declined ({err}); returning {request}");
                Decision::new(request, DecisionSource::Fallback(err))
            },
        }
    }

    fn matching_rule<'a>(
        &self,
        rules: &'a [StageRule],
        tier: u8,
        atlas: &Atlas,
        obs: &Observation,
        candidate: Option<Direction>,
    ) -> Option<&'a StageRule> {
        let quest = self.state.active_quest_id()?;
        rules.iter().find(|rule| {
            rule.effect.tier() == tier
                && !(rule.only_once && self.state.fired_rules.contains(&rule_key(quest, &rule.name)))
                && rule.matches(atlas, obs, candidate)
        })
    }

    fn fire(&mut self, quest: &str, rule: &StageRule) {
        info!("stage rule '{}' of quest {quest} fired", rule.name);
        self.state.stage_override_active = true;
        if rule.only_once {
            self.state.fired_rules.insert(rule_key(quest, &rule.name));
        }
    }
}

fn rule_key(quest: &str, rule: &str) -> String {
    format!("{quest}/{rule}")
}
