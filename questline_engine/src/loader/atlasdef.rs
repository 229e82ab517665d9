//! AtlasDef loader and conversion helpers.
//!
//! Converts the serialized `AtlasDef` data model into runtime engine structs.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

use questline_data::{
    AtlasDef, MapDef, QuestDef, RuleConditionDef, RuleEffectDef, SegmentDef, StageRuleDef, TriggerDef, WarpDef,
};

use crate::action::Action;
use crate::atlas::Atlas;
use crate::coords::{GlobalCoord, MapId, MapInfo};
use crate::grid::TransitionRules;
use crate::quest::{Quest, RuleCondition, RuleEffect, StageRule, TriggerCondition};
use crate::route::{RouteKey, RouteSegment, WarpPoint};

/// Load an `AtlasDef` from a RON file.
pub fn load_atlasdef(path: &Path) -> Result<AtlasDef> {
    let text = fs::read_to_string(path).with_context(|| format!("reading atlas from '{}'", path.display()))?;
    ron::from_str(&text).with_context(|| format!("parsing atlas RON from '{}'", path.display()))
}

/// Convert a validated `AtlasDef` into a populated `Atlas`.
pub fn build_atlas_from_def(def: &AtlasDef) -> Result<Atlas> {
    let mut atlas = Atlas {
        title: def.meta.title.clone(),
        version: def.meta.version.clone(),
        ..Atlas::default()
    };

    for map_def in &def.maps {
        atlas.maps.insert(map_from_def(map_def));
    }
    for warp_def in &def.warps {
        atlas.routes.insert_warp(warp_from_def(warp_def));
    }
    for tileset in &def.tilesets {
        atlas.tilesets.insert(tileset.id.clone(), TransitionRules::from(tileset));
    }
    for quest_def in &def.quests {
        for segment in &quest_def.segments {
            atlas.routes.insert_segment(segment_from_def(&quest_def.id, segment));
        }
    }
    atlas.quests = def
        .quests
        .iter()
        .map(|q| quest_from_def(q).with_context(|| format!("while building quest '{}'", q.id)))
        .collect::<Result<Vec<_>>>()?;

    Ok(atlas)
}

fn map_from_def(def: &MapDef) -> MapInfo {
    MapInfo {
        id: MapId(def.id),
        name: def.name.clone(),
        origin_row: def.origin.0,
        origin_col: def.origin.1,
        height: def.height,
        width: def.width,
        tileset: def.tileset.clone(),
    }
}

fn warp_from_def(def: &WarpDef) -> WarpPoint {
    WarpPoint {
        at: coord(def.map, def.at),
        destination: MapId(def.to),
        exit: def.exit.map(Into::into),
    }
}

fn segment_from_def(quest: &str, def: &SegmentDef) -> RouteSegment {
    RouteSegment::new(
        RouteKey::new(quest, MapId(def.map)),
        def.points.iter().map(|point| coord(def.map, *point)).collect(),
    )
}

fn quest_from_def(def: &QuestDef) -> Result<Quest> {
    Ok(Quest {
        id: def.id.clone(),
        name: def.name.clone(),
        description: def.description.clone(),
        prerequisites: def.prerequisites.clone(),
        triggers: def.triggers.iter().map(trigger_from_def).collect::<Result<Vec<_>>>()?,
        stage_rules: def.stage_rules.iter().map(stage_rule_from_def).collect(),
    })
}

fn trigger_from_def(def: &TriggerDef) -> Result<TriggerCondition> {
    Ok(match def {
        TriggerDef::EventFlag { flag } => TriggerCondition::EventFlag(flag.clone()),
        TriggerDef::MissingEventFlag { flag } => TriggerCondition::MissingEventFlag(flag.clone()),
        TriggerDef::HasItem { item, min } => TriggerCondition::HasItem {
            item: item.clone(),
            min: *min,
        },
        TriggerDef::MissingItem { item } => TriggerCondition::MissingItem(item.clone()),
        TriggerDef::InMap { map } => TriggerCondition::InMap(MapId(*map)),
        TriggerDef::PreviousMap { map } => TriggerCondition::PreviousMap(MapId(*map)),
        TriggerDef::MapTransition { from, to } => TriggerCondition::MapTransition {
            from: MapId(*from),
            to: MapId(*to),
        },
        TriggerDef::PartySize { min } => TriggerCondition::PartySize(*min),
        TriggerDef::DialogContains { text } => TriggerCondition::DialogContains(text.clone()),
        TriggerDef::DialogMatches { pattern } => TriggerCondition::DialogMatches(
            Regex::new(pattern).with_context(|| format!("compiling dialog pattern '{pattern}'"))?,
        ),
        TriggerDef::AtCoordinate { map, at } => TriggerCondition::AtCoordinate(coord(*map, *at)),
        TriggerDef::InArea {
            map,
            top_left,
            bottom_right,
        } => TriggerCondition::InArea {
            map: MapId(*map),
            top_left: *top_left,
            bottom_right: *bottom_right,
        },
        TriggerDef::QuestCompleted { quest } => TriggerCondition::QuestCompleted(quest.clone()),
    })
}

fn stage_rule_from_def(def: &StageRuleDef) -> StageRule {
    StageRule {
        name: def.name.clone(),
        conditions: def.conditions.iter().map(rule_condition_from_def).collect(),
        effect: match &def.effect {
            RuleEffectDef::PassThrough => RuleEffect::PassThrough,
            RuleEffectDef::Substitute { action } => RuleEffect::Substitute(Action::from(*action)),
            RuleEffectDef::ForcedSequence { actions } => {
                RuleEffect::ForcedSequence(actions.iter().copied().map(Action::from).collect())
            },
        },
        only_once: def.only_once,
    }
}

fn rule_condition_from_def(def: &RuleConditionDef) -> RuleCondition {
    match def {
        RuleConditionDef::At { map, at } => RuleCondition::At(coord(*map, *at)),
        RuleConditionDef::InMap { map } => RuleCondition::InMap(MapId(*map)),
        RuleConditionDef::HasItem { item } => RuleCondition::HasItem(item.clone()),
        RuleConditionDef::MissingItem { item } => RuleCondition::MissingItem(item.clone()),
        RuleConditionDef::FlagSet { flag } => RuleCondition::FlagSet(flag.clone()),
        RuleConditionDef::FlagClear { flag } => RuleCondition::FlagClear(flag.clone()),
        RuleConditionDef::EntersWarp { to } => RuleCondition::EntersWarp { to: to.map(MapId) },
        RuleConditionDef::CrossesEdge { edge } => RuleCondition::CrossesEdge((*edge).into()),
        RuleConditionDef::Always => RuleCondition::Always,
    }
}

fn coord(map: u32, (row, col): (i32, i32)) -> GlobalCoord {
    GlobalCoord::new(MapId(map), row, col)
}
