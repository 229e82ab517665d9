use std::sync::Arc;

use questline_data::{AtlasDef, DirectionDef, MapDef, MetaDef, QuestDef, SegmentDef, TriggerDef, WarpDef};
use questline_engine as qe;
use questline_engine::loader::atlasdef::build_atlas_from_def;
use qe::{
    Action, Decision, DecisionSource, Direction, EngineConfig, GlobalCoord, MapId, ModalContext, NavError,
    Observation, ProgressEvent, QuestPhase, RouteKey, Session,
};

const FIELD: MapId = MapId(1);
const CELLAR: MapId = MapId(2);

fn quest(id: &str, segments: Vec<SegmentDef>, triggers: Vec<TriggerDef>) -> QuestDef {
    QuestDef {
        id: id.into(),
        name: format!("Quest {id}"),
        description: String::new(),
        prerequisites: Vec::new(),
        segments,
        triggers,
        stage_rules: Vec::new(),
    }
}

/// Map 1 spans global rows/cols 0..10, map 2 spans 20..30.
fn field_and_cellar() -> Vec<MapDef> {
    vec![
        MapDef {
            id: 1,
            name: "Field".into(),
            origin: (-20, -20),
            height: 10,
            width: 10,
            tileset: None,
        },
        MapDef {
            id: 2,
            name: "Cellar".into(),
            origin: (0, 0),
            height: 10,
            width: 10,
            tileset: None,
        },
    ]
}

/// No warps connect the two maps.
fn atlas() -> Arc<qe::Atlas> {
    let def = AtlasDef {
        meta: MetaDef {
            title: "Scenarios".into(),
            ..MetaDef::default()
        },
        maps: field_and_cellar(),
        quests: vec![
            quest(
                "3",
                vec![SegmentDef {
                    map: 1,
                    points: vec![(5, 5), (5, 6), (5, 7)],
                }],
                vec![
                    TriggerDef::EventFlag { flag: "a".into() },
                    TriggerDef::HasItem {
                        item: "b".into(),
                        min: 1,
                    },
                ],
            ),
            quest(
                "4",
                vec![
                    SegmentDef {
                        map: 1,
                        points: vec![(7, 7), (7, 6), (7, 5)],
                    },
                    SegmentDef {
                        map: 2,
                        points: vec![(22, 22), (22, 23)],
                    },
                ],
                vec![TriggerDef::EventFlag { flag: "c".into() }],
            ),
        ],
        ..AtlasDef::default()
    };
    assert!(questline_data::validate_atlas(&def).is_empty());
    Arc::new(build_atlas_from_def(&def).expect("scenario atlas builds"))
}

fn session() -> Session {
    Session::new(atlas(), &EngineConfig::default())
}

fn at(map: MapId, row: i32, col: i32) -> Observation {
    Observation::at(GlobalCoord::new(map, row, col))
}

#[test]
fn standing_on_cursor_moves_toward_next_point() {
    let mut session = session();
    assert_eq!(session.navigator_state().cursor, Some(0));

    let outcome = session.step(Action::FollowRoute, &at(FIELD, 5, 5));
    assert_eq!(
        outcome.decision,
        Decision::new(Action::Walk(Direction::Right), DecisionSource::Navigator)
    );
    assert_eq!(session.navigator_state().cursor, Some(1));
}

#[test]
fn unreachable_map_returns_request_unchanged() {
    let mut session = session();
    let outcome = session.step(Action::FollowRoute, &at(CELLAR, 25, 25));
    assert_eq!(outcome.decision.action, Action::FollowRoute);
    assert!(matches!(
        outcome.decision.source,
        DecisionSource::Fallback(NavError::PathNotFound { .. })
    ));

    // A concrete request comes back untouched too.
    let outcome = session.step(Action::Walk(Direction::Left), &at(CELLAR, 25, 25));
    assert_eq!(
        outcome.decision,
        Decision::new(Action::Walk(Direction::Left), DecisionSource::Requested)
    );
}

#[test]
fn battle_suspends_navigation() {
    let mut session = session();
    session.step(Action::FollowRoute, &at(FIELD, 5, 5));
    let before = session.navigator_state().clone();

    let battle = at(FIELD, 5, 6).with_modal(ModalContext::Battle);
    let outcome = session.step(Action::FollowRoute, &battle);
    assert_eq!(outcome.decision, Decision::new(Action::FollowRoute, DecisionSource::Modal));
    assert_eq!(session.navigator_state(), &before);
}

#[test]
fn completing_quest_three_loads_quest_four_route() {
    let mut session = session();
    let events = session.observe(&at(FIELD, 5, 5).with_flag("a").with_item("b", 1));
    assert!(events.contains(&ProgressEvent::QuestCompleted("3".into())));
    assert!(events.contains(&ProgressEvent::QuestStarted("4".into())));
    assert_eq!(
        session.quest_state().phase,
        QuestPhase::Active { quest: "4".into() }
    );
    assert_eq!(session.navigator_state().active_route, Some(RouteKey::new("4", FIELD)));
    assert_eq!(session.navigator_state().cursor, Some(0));
}

#[test]
fn partial_triggers_never_advance() {
    let mut session = session();
    for _ in 0..3 {
        session.step(Action::FollowRoute, &at(FIELD, 5, 5).with_flag("a"));
    }
    assert_eq!(session.quest_state().active_quest_id().map(String::as_str), Some("3"));
}

#[test]
fn identical_sessions_make_identical_decisions() {
    let mut first = session();
    let mut second = session();
    let walk = [at(FIELD, 5, 5), at(FIELD, 5, 6), at(FIELD, 9, 9), at(CELLAR, 21, 21)];
    for obs in &walk {
        let a = first.step(Action::FollowRoute, obs);
        let b = second.step(Action::FollowRoute, obs);
        assert_eq!(a, b);
        assert_eq!(first.navigator_state(), second.navigator_state());
    }
}

#[test]
fn final_point_is_reached_once() {
    let mut session = session();
    for col in [5, 6] {
        session.step(Action::FollowRoute, &at(FIELD, 5, col));
    }
    let end = at(FIELD, 5, 7);
    for _ in 0..2 {
        let outcome = session.step(Action::FollowRoute, &end);
        assert!(matches!(
            outcome.decision.source,
            DecisionSource::Fallback(NavError::RouteComplete { .. })
        ));
        assert_eq!(outcome.decision.action, Action::FollowRoute);
        assert_eq!(session.navigator_state().cursor, Some(3));
    }
}

#[test]
fn local_positions_convert_through_the_atlas() {
    let session = session();
    assert_eq!(
        session.locate(FIELD, qe::LocalCoord::new(5, 5)),
        Ok(GlobalCoord::new(FIELD, 5, 5))
    );
    assert_eq!(
        session.locate(CELLAR, qe::LocalCoord::new(0, 0)),
        Ok(GlobalCoord::new(CELLAR, 20, 20))
    );
}

#[test]
fn occupied_target_falls_back_to_request() {
    let mut session = session();
    let grid = qe::Viewport::from_ascii(&[
        ".........",
        ".........",
        ".........",
        ".........",
        "....@o...",
        ".........",
        ".........",
        ".........",
        ".........",
    ])
    .expect("viewport parses");
    let obs = at(FIELD, 5, 5).with_viewport(grid);
    let outcome = session.step(Action::FollowRoute, &obs);
    assert_eq!(outcome.decision.action, Action::FollowRoute);
    assert!(matches!(
        outcome.decision.source,
        DecisionSource::Fallback(NavError::PathNotFound { .. })
    ));
    // The point underfoot still counts as reached.
    assert_eq!(session.navigator_state().cursor, Some(1));
}

/// Same two maps joined by a door: stepping on (5, 9) in the field lands on
/// (20, 20) in the cellar.
fn door_atlas() -> Arc<qe::Atlas> {
    let def = AtlasDef {
        meta: MetaDef {
            title: "Door".into(),
            ..MetaDef::default()
        },
        maps: field_and_cellar(),
        warps: vec![
            WarpDef {
                map: 1,
                at: (5, 9),
                to: 2,
                exit: None,
            },
            WarpDef {
                map: 2,
                at: (20, 20),
                to: 1,
                exit: Some(DirectionDef::Up),
            },
        ],
        quests: vec![quest(
            "down",
            vec![
                SegmentDef {
                    map: 1,
                    points: vec![(5, 5), (5, 6)],
                },
                SegmentDef {
                    map: 2,
                    points: vec![(20, 20), (21, 20), (22, 20)],
                },
            ],
            vec![TriggerDef::EventFlag { flag: "down".into() }],
        )],
        ..AtlasDef::default()
    };
    assert!(questline_data::validate_atlas(&def).is_empty());
    Arc::new(build_atlas_from_def(&def).expect("door atlas builds"))
}

#[test]
fn route_continues_through_a_door_past_the_segment_end() {
    let mut session = Session::new(door_atlas(), &EngineConfig::default());
    let door = GlobalCoord::new(FIELD, 5, 9);
    let mut obs = at(FIELD, 5, 5);
    let mut moves = Vec::new();
    for _ in 0..10 {
        let outcome = session.step(Action::FollowRoute, &obs);
        let Action::Walk(direction) = outcome.decision.action else {
            break;
        };
        moves.push(direction);
        let next = obs.position.step(direction);
        obs = if next == door {
            at(CELLAR, 20, 20).with_previous_map(FIELD)
        } else {
            Observation::at(next)
        };
    }
    assert_eq!(
        moves,
        vec![
            Direction::Right,
            Direction::Right,
            Direction::Right,
            Direction::Right,
            Direction::Down,
            Direction::Down,
        ]
    );
    assert_eq!(obs.position, GlobalCoord::new(CELLAR, 22, 20));
    assert_eq!(session.navigator_state().active_route, Some(RouteKey::new("down", CELLAR)));
}
