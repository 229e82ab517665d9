use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::*;

/// Validation error for malformed data or missing references in an `AtlasDef`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    DuplicateId { kind: &'static str, id: String },
    MissingReference { kind: &'static str, id: String, context: String },
    InvalidValue { context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateId { kind, id } => {
                write!(f, "duplicate {kind} id '{id}'")
            },
            ValidationError::MissingReference { kind, id, context } => {
                write!(f, "missing {kind} '{id}' ({context})")
            },
            ValidationError::InvalidValue { context } => {
                write!(f, "invalid value ({context})")
            },
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate cross-references and route invariants in an `AtlasDef`.
///
/// ```
/// use questline_data::{AtlasDef, MapDef, MetaDef, QuestDef, SegmentDef, TriggerDef, validate_atlas};
///
/// let atlas = AtlasDef {
///     meta: MetaDef { title: "Demo".into(), ..MetaDef::default() },
///     maps: vec![MapDef {
///         id: 1,
///         name: "Town".into(),
///         origin: (0, 0),
///         height: 10,
///         width: 10,
///         tileset: None,
///     }],
///     quests: vec![QuestDef {
///         id: "001".into(),
///         name: "Leave home".into(),
///         description: String::new(),
///         prerequisites: Vec::new(),
///         segments: vec![SegmentDef { map: 1, points: vec![(25, 25), (25, 26)] }],
///         triggers: vec![TriggerDef::InMap { map: 1 }],
///         stage_rules: Vec::new(),
///     }],
///     ..AtlasDef::default()
/// };
/// assert!(validate_atlas(&atlas).is_empty());
/// ```
pub fn validate_atlas(atlas: &AtlasDef) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut maps = HashSet::new();
    let mut tilesets = HashSet::new();
    let mut quests = HashSet::new();

    let map_keys: Vec<String> = atlas.maps.iter().map(|m| m.id.to_string()).collect();
    track_ids("map", map_keys.iter().map(String::as_str), &mut maps, &mut errors);
    track_ids(
        "tileset",
        atlas.tilesets.iter().map(|t| t.id.as_str()),
        &mut tilesets,
        &mut errors,
    );
    track_ids(
        "quest",
        atlas.quests.iter().map(|q| q.id.as_str()),
        &mut quests,
        &mut errors,
    );

    let bounds: HashMap<MapNum, &MapDef> = atlas.maps.iter().map(|m| (m.id, m)).collect();

    for map in &atlas.maps {
        if map.height == 0 || map.width == 0 {
            errors.push(ValidationError::InvalidValue {
                context: format!("map {} has empty dimensions {}x{}", map.id, map.height, map.width),
            });
        }
        if let Some(tileset) = &map.tileset {
            check_ref("tileset", tileset, &tilesets, format!("map {}", map.id), &mut errors);
        }
    }

    let mut warp_tiles: HashSet<(MapNum, Point)> = HashSet::new();
    for warp in &atlas.warps {
        let context = format!("warp at {:?} on map {}", warp.at, warp.map);
        check_map(warp.map, &bounds, &context, &mut errors);
        check_map(warp.to, &bounds, &context, &mut errors);
        check_point(warp.map, warp.at, &bounds, &context, &mut errors);
        warp_tiles.insert((warp.map, warp.at));
    }

    for quest in &atlas.quests {
        for prereq in &quest.prerequisites {
            if *prereq == quest.id {
                errors.push(ValidationError::InvalidValue {
                    context: format!("quest '{}' lists itself as a prerequisite", quest.id),
                });
            } else {
                check_ref("quest", prereq, &quests, format!("prerequisite of quest '{}'", quest.id), &mut errors);
            }
        }

        let mut seen_maps = HashSet::new();
        for segment in &quest.segments {
            let context = format!("quest '{}' segment on map {}", quest.id, segment.map);
            check_map(segment.map, &bounds, &context, &mut errors);
            if !seen_maps.insert(segment.map) {
                errors.push(ValidationError::DuplicateId {
                    kind: "segment",
                    id: format!("{}/{}", quest.id, segment.map),
                });
            }
            validate_segment(segment, &bounds, &warp_tiles, &context, &mut errors);
        }

        for trigger in &quest.triggers {
            let context = format!("trigger of quest '{}'", quest.id);
            match trigger {
                TriggerDef::InMap { map } | TriggerDef::PreviousMap { map } => {
                    check_map(*map, &bounds, &context, &mut errors);
                },
                TriggerDef::MapTransition { from, to } => {
                    check_map(*from, &bounds, &context, &mut errors);
                    check_map(*to, &bounds, &context, &mut errors);
                },
                TriggerDef::AtCoordinate { map, at } => {
                    check_map(*map, &bounds, &context, &mut errors);
                    check_point(*map, *at, &bounds, &context, &mut errors);
                },
                TriggerDef::InArea {
                    map,
                    top_left,
                    bottom_right,
                } => {
                    check_map(*map, &bounds, &context, &mut errors);
                    if top_left.0 > bottom_right.0 || top_left.1 > bottom_right.1 {
                        errors.push(ValidationError::InvalidValue {
                            context: format!("{context}: area corners {top_left:?} / {bottom_right:?} are inverted"),
                        });
                    }
                },
                TriggerDef::QuestCompleted { quest: other } => {
                    check_ref("quest", other, &quests, context, &mut errors);
                },
                TriggerDef::DialogContains { text } | TriggerDef::DialogMatches { pattern: text }
                    if text.trim().is_empty() =>
                {
                    errors.push(ValidationError::InvalidValue {
                        context: format!("{context}: empty dialog text"),
                    });
                },
                _ => {},
            }
        }

        for rule in &quest.stage_rules {
            let context = format!("stage rule '{}' of quest '{}'", rule.name, quest.id);
            for condition in &rule.conditions {
                match condition {
                    RuleConditionDef::At { map, at } => {
                        check_map(*map, &bounds, &context, &mut errors);
                        check_point(*map, *at, &bounds, &context, &mut errors);
                    },
                    RuleConditionDef::InMap { map } | RuleConditionDef::EntersWarp { to: Some(map) } => {
                        check_map(*map, &bounds, &context, &mut errors);
                    },
                    _ => {},
                }
            }
            if let RuleEffectDef::ForcedSequence { actions } = &rule.effect
                && actions.is_empty()
            {
                errors.push(ValidationError::InvalidValue {
                    context: format!("{context}: forced sequence is empty"),
                });
            }
        }
    }

    for quest_id in prerequisite_cycles(atlas) {
        errors.push(ValidationError::InvalidValue {
            context: format!("quest '{quest_id}' is part of a prerequisite cycle"),
        });
    }

    errors
}

fn track_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
    seen: &mut HashSet<String>,
    errors: &mut Vec<ValidationError>,
) {
    for id in ids {
        if !seen.insert(id.to_string()) {
            errors.push(ValidationError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
}

fn check_ref(kind: &'static str, id: &str, set: &HashSet<String>, context: String, errors: &mut Vec<ValidationError>) {
    if !set.contains(id) {
        errors.push(ValidationError::MissingReference {
            kind,
            id: id.to_string(),
            context,
        });
    }
}

fn check_map(map: MapNum, bounds: &HashMap<MapNum, &MapDef>, context: &str, errors: &mut Vec<ValidationError>) {
    if !bounds.contains_key(&map) {
        errors.push(ValidationError::MissingReference {
            kind: "map",
            id: map.to_string(),
            context: context.to_string(),
        });
    }
}

/// Report a point that falls outside its map. Unknown maps are reported by `check_map`.
fn check_point(
    map: MapNum,
    point: Point,
    bounds: &HashMap<MapNum, &MapDef>,
    context: &str,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(def) = bounds.get(&map)
        && !map_contains(def, point)
    {
        errors.push(ValidationError::InvalidValue {
            context: format!("{context}: point {point:?} lies outside map {map}"),
        });
    }
}

fn map_contains(map: &MapDef, (row, col): Point) -> bool {
    let top = map.origin.0.saturating_add(GLOBAL_PAD);
    let left = map.origin.1.saturating_add(GLOBAL_PAD);
    let height = i32::try_from(map.height).unwrap_or(i32::MAX);
    let width = i32::try_from(map.width).unwrap_or(i32::MAX);
    (top..top.saturating_add(height)).contains(&row) && (left..left.saturating_add(width)).contains(&col)
}

fn validate_segment(
    segment: &SegmentDef,
    bounds: &HashMap<MapNum, &MapDef>,
    warp_tiles: &HashSet<(MapNum, Point)>,
    context: &str,
    errors: &mut Vec<ValidationError>,
) {
    if segment.points.is_empty() {
        errors.push(ValidationError::InvalidValue {
            context: format!("{context}: no points"),
        });
        return;
    }

    for point in &segment.points {
        check_point(segment.map, *point, bounds, context, errors);
    }

    for (idx, pair) in segment.points.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        let distance = a.0.abs_diff(b.0).saturating_add(a.1.abs_diff(b.1));
        if distance == 0 {
            errors.push(ValidationError::InvalidValue {
                context: format!("{context}: point {a:?} repeated at index {}", idx + 1),
            });
        } else if distance > 1
            && !warp_tiles.contains(&(segment.map, a))
            && !warp_tiles.contains(&(segment.map, b))
        {
            errors.push(ValidationError::InvalidValue {
                context: format!(
                    "{context}: points {a:?} and {b:?} at index {idx} are neither adjacent nor joined by a warp"
                ),
            });
        }
    }
}

/// Quest ids that sit on a prerequisite cycle, in atlas order.
fn prerequisite_cycles(atlas: &AtlasDef) -> Vec<String> {
    let edges: HashMap<&str, Vec<&str>> = atlas
        .quests
        .iter()
        .map(|q| (q.id.as_str(), q.prerequisites.iter().map(String::as_str).collect()))
        .collect();

    atlas
        .quests
        .iter()
        .filter(|quest| reaches(&edges, quest.id.as_str(), quest.id.as_str()))
        .map(|quest| quest.id.clone())
        .collect()
}

fn reaches(edges: &HashMap<&str, Vec<&str>>, from: &str, target: &str) -> bool {
    let mut stack: Vec<&str> = edges.get(from).cloned().unwrap_or_default();
    let mut visited = HashSet::new();
    while let Some(next) = stack.pop() {
        if next == target {
            return true;
        }
        if visited.insert(next)
            && let Some(more) = edges.get(next)
        {
            stack.extend(more.iter().copied());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn town() -> MapDef {
        MapDef {
            id: 1,
            name: "Town".into(),
            origin: (0, 0),
            height: 10,
            width: 10,
            tileset: None,
        }
    }

    fn quest(id: &str) -> QuestDef {
        QuestDef {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            prerequisites: Vec::new(),
            segments: vec![SegmentDef {
                map: 1,
                points: vec![(22, 22), (22, 23)],
            }],
            triggers: vec![TriggerDef::InMap { map: 1 }],
            stage_rules: Vec::new(),
        }
    }

    fn atlas(quests: Vec<QuestDef>) -> AtlasDef {
        AtlasDef {
            meta: MetaDef {
                title: "test".into(),
                ..MetaDef::default()
            },
            maps: vec![town()],
            quests,
            ..AtlasDef::default()
        }
    }

    #[test]
    fn valid_atlas_has_no_errors() {
        assert!(validate_atlas(&atlas(vec![quest("a"), quest("b")])).is_empty());
    }

    #[test]
    fn extreme_points_are_reported_not_overflowed() {
        let mut far = town();
        far.origin = (i32::MAX, i32::MIN);
        let mut q = quest("a");
        q.segments[0].points = vec![(i32::MIN, 0), (i32::MAX, 0)];
        let mut def = atlas(vec![q]);
        def.maps = vec![far];
        let errors = validate_atlas(&def);
        assert!(errors.iter().any(|e| e.to_string().contains("lies outside map 1")));
        assert!(errors.iter().any(|e| e.to_string().contains("neither adjacent")));
    }

    #[test]
    fn duplicate_quests_and_segments_are_reported() {
        let mut q = quest("a");
        q.segments.push(q.segments[0].clone());
        let errors = validate_atlas(&atlas(vec![q, quest("a")]));
        assert!(errors.contains(&ValidationError::DuplicateId {
            kind: "quest",
            id: "a".into()
        }));
        assert!(errors.contains(&ValidationError::DuplicateId {
            kind: "segment",
            id: "a/1".into()
        }));
    }

    #[test]
    fn unknown_map_references_are_reported() {
        let mut q = quest("a");
        q.triggers.push(TriggerDef::MapTransition { from: 1, to: 9 });
        let errors = validate_atlas(&atlas(vec![q]));
        assert_eq!(
            errors,
            vec![ValidationError::MissingReference {
                kind: "map",
                id: "9".into(),
                context: "trigger of quest 'a'".into(),
            }]
        );
    }

    #[test]
    fn repeated_and_gapped_points_are_rejected() {
        let mut q = quest("a");
        q.segments[0].points = vec![(22, 22), (22, 22), (22, 25)];
        let errors = validate_atlas(&atlas(vec![q]));
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn gap_across_a_warp_tile_is_allowed() {
        let mut def = atlas(vec![quest("a")]);
        def.maps.push(MapDef {
            id: 2,
            name: "House".into(),
            origin: (40, 0),
            height: 8,
            width: 8,
            tileset: None,
        });
        def.warps.push(WarpDef {
            map: 1,
            at: (22, 25),
            to: 2,
            exit: None,
        });
        def.quests[0].segments[0].points = vec![(22, 24), (22, 25), (24, 25)];
        assert!(validate_atlas(&def).is_empty());
    }

    #[test]
    fn points_outside_the_map_are_rejected() {
        let mut q = quest("a");
        q.segments[0].points = vec![(5, 5)];
        let errors = validate_atlas(&atlas(vec![q]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("outside map 1"));
    }

    #[test]
    fn prerequisite_cycles_are_rejected() {
        let mut a = quest("a");
        let mut b = quest("b");
        a.prerequisites.push("b".into());
        b.prerequisites.push("a".into());
        let errors = validate_atlas(&atlas(vec![a, b]));
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("prerequisite cycle"));
    }

    #[test]
    fn empty_forced_sequence_is_rejected() {
        let mut q = quest("a");
        q.stage_rules.push(StageRuleDef {
            name: "walk".into(),
            conditions: vec![RuleConditionDef::Always],
            effect: RuleEffectDef::ForcedSequence { actions: Vec::new() },
            only_once: true,
        });
        let errors = validate_atlas(&atlas(vec![q]));
        assert_eq!(errors.len(), 1);
    }
}
