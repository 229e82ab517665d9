//! Route store.
//!
//! Holds every quest's route segments (one per map) and the warp tiles of each
//! map. Lookups never mutate stored routes; the navigator keeps its own cursor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coords::{Direction, GlobalCoord, MapId};
use crate::quest::QuestId;

/// Identifies one segment: a quest holds at most one segment per map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub quest: QuestId,
    pub map: MapId,
}

impl RouteKey {
    pub fn new(quest: impl Into<QuestId>, map: MapId) -> Self {
        Self {
            quest: quest.into(),
            map,
        }
    }
}

/// Ordered global coordinates on one map for one quest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSegment {
    key: RouteKey,
    points: Vec<GlobalCoord>,
}

impl RouteSegment {
    pub fn new(key: RouteKey, points: Vec<GlobalCoord>) -> Self {
        Self { key, points }
    }

    pub fn key(&self) -> &RouteKey {
        &self.key
    }

    pub fn map(&self) -> MapId {
        self.key.map
    }

    pub fn points(&self) -> &[GlobalCoord] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&GlobalCoord> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Index of the route point closest to `position` (Manhattan), lowest index on ties.
///
/// Returns `None` only for an empty route.
pub fn nearest_point(route: &RouteSegment, position: &GlobalCoord) -> Option<usize> {
    route
        .points
        .iter()
        .enumerate()
        .min_by_key(|(idx, point)| (point.manhattan(position), *idx))
        .map(|(idx, _)| idx)
}

/// A tile on `at.map` that moves the agent to `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarpPoint {
    pub at: GlobalCoord,
    pub destination: MapId,
    /// Direction to press while standing on the tile, if stepping on it is not enough.
    pub exit: Option<Direction>,
}

/// Read-only store of route segments and warps.
#[derive(Debug, Clone, Default)]
pub struct RouteStore {
    segments: BTreeMap<RouteKey, RouteSegment>,
    order: BTreeMap<QuestId, Vec<MapId>>,
    warps: BTreeMap<MapId, Vec<WarpPoint>>,
}

impl RouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a segment. Segments of a quest keep their insertion order.
    pub fn insert_segment(&mut self, segment: RouteSegment) {
        let key = segment.key.clone();
        let order = self.order.entry(key.quest.clone()).or_default();
        if !order.contains(&key.map) {
            order.push(key.map);
        }
        self.segments.insert(key, segment);
    }

    pub fn insert_warp(&mut self, warp: WarpPoint) {
        self.warps.entry(warp.at.map).or_default().push(warp);
    }

    /// The active quest's segment on `map`, if it has one.
    pub fn find_route_for(&self, quest: &str, map: MapId) -> Option<&RouteSegment> {
        self.segments.get(&RouteKey::new(quest, map))
    }

    pub fn get(&self, key: &RouteKey) -> Option<&RouteSegment> {
        self.segments.get(key)
    }

    /// The first segment declared for a quest.
    pub fn first_route(&self, quest: &str) -> Option<&RouteSegment> {
        let map = *self.order.get(quest)?.first()?;
        self.find_route_for(quest, map)
    }

    /// Segments of a quest in declaration order.
    pub fn routes_for_quest<'a>(&'a self, quest: &'a str) -> impl Iterator<Item = &'a RouteSegment> + 'a {
        self.order
            .get(quest)
            .into_iter()
            .flatten()
            .filter_map(move |map| self.find_route_for(quest, *map))
    }

    /// The segment declared after `key` for the same quest.
    pub fn next_segment(&self, key: &RouteKey) -> Option<&RouteSegment> {
        let order = self.order.get(&key.quest)?;
        let idx = order.iter().position(|map| *map == key.map)?;
        let map = *order.get(idx + 1)?;
        self.find_route_for(&key.quest, map)
    }

    /// Whether `key` comes after `other` in their quest's declaration order.
    pub fn declared_after(&self, key: &RouteKey, other: &RouteKey) -> bool {
        if key.quest != other.quest {
            return false;
        }
        let Some(order) = self.order.get(&key.quest) else {
            return false;
        };
        let position = |map: MapId| order.iter().position(|m| *m == map);
        matches!((position(key.map), position(other.map)), (Some(a), Some(b)) if a > b)
    }

    pub fn warps_on(&self, map: MapId) -> &[WarpPoint] {
        self.warps.get(&map).map_or(&[], Vec::as_slice)
    }

    /// The warp tile on `map` at `coord`, if any.
    pub fn warp_at(&self, coord: &GlobalCoord) -> Option<&WarpPoint> {
        self.warps_on(coord.map).iter().find(|w| w.at.same_tile(coord))
    }

    /// Closest warp on `map` to `position`, preferring warps that lead to `toward`.
    ///
    /// Falls back to any warp on the map when none lead to `toward`. Distance ties
    /// go to the warp declared first.
    pub fn nearest_warp(&self, map: MapId, position: &GlobalCoord, toward: MapId) -> Option<&WarpPoint> {
        let warps = self.warps_on(map);
        closest_warp(warps.iter().filter(|w| w.destination == toward), position)
            .or_else(|| closest_warp(warps.iter(), position))
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn warp_count(&self) -> usize {
        self.warps.values().map(Vec::len).sum()
    }
}

fn closest_warp<'a>(candidates: impl Iterator<Item = &'a WarpPoint>, position: &GlobalCoord) -> Option<&'a WarpPoint> {
    candidates
        .enumerate()
        .min_by_key(|(idx, warp)| (warp.at.manhattan(position), *idx))
        .map(|(_, warp)| warp)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOWN: MapId = MapId(1);
    const HOUSE: MapId = MapId(2);
    const LAB: MapId = MapId(3);

    fn at(map: MapId, row: i32, col: i32) -> GlobalCoord {
        GlobalCoord::new(map, row, col)
    }

    fn store() -> RouteStore {
        let mut store = RouteStore::new();
        store.insert_segment(RouteSegment::new(
            RouteKey::new("q1", HOUSE),
            vec![at(HOUSE, 5, 5), at(HOUSE, 6, 5)],
        ));
        store.insert_segment(RouteSegment::new(
            RouteKey::new("q1", TOWN),
            vec![at(TOWN, 10, 10), at(TOWN, 10, 11), at(TOWN, 10, 12)],
        ));
        store.insert_warp(WarpPoint {
            at: at(TOWN, 8, 8),
            destination: LAB,
            exit: None,
        });
        store.insert_warp(WarpPoint {
            at: at(TOWN, 14, 14),
            destination: HOUSE,
            exit: Some(Direction::Up),
        });
        store
    }

    #[test]
    fn find_route_for_is_keyed_by_quest_and_map() {
        let store = store();
        assert_eq!(store.find_route_for("q1", TOWN).unwrap().len(), 3);
        assert!(store.find_route_for("q1", LAB).is_none());
        assert!(store.find_route_for("q2", TOWN).is_none());
    }

    #[test]
    fn first_route_follows_declaration_order() {
        let store = store();
        assert_eq!(store.first_route("q1").unwrap().map(), HOUSE);
        let maps: Vec<_> = store.routes_for_quest("q1").map(RouteSegment::map).collect();
        assert_eq!(maps, vec![HOUSE, TOWN]);
    }

    #[test]
    fn next_segment_walks_declaration_order() {
        let store = store();
        let next = store.next_segment(&RouteKey::new("q1", HOUSE)).unwrap();
        assert_eq!(next.map(), TOWN);
        assert!(store.next_segment(&RouteKey::new("q1", TOWN)).is_none());
        assert!(store.next_segment(&RouteKey::new("q9", TOWN)).is_none());
    }

    #[test]
    fn declared_after_compares_within_a_quest() {
        let store = store();
        let house = RouteKey::new("q1", HOUSE);
        let town = RouteKey::new("q1", TOWN);
        assert!(store.declared_after(&town, &house));
        assert!(!store.declared_after(&house, &town));
        assert!(!store.declared_after(&town, &town));
        assert!(!store.declared_after(&RouteKey::new("q2", TOWN), &house));
    }

    #[test]
    fn nearest_point_picks_minimum_distance() {
        let store = store();
        let route = store.find_route_for("q1", TOWN).unwrap();
        assert_eq!(nearest_point(route, &at(TOWN, 12, 12)), Some(2));
        assert_eq!(nearest_point(route, &at(TOWN, 9, 10)), Some(0));
    }

    #[test]
    fn nearest_point_ties_go_to_lowest_index() {
        let route = RouteSegment::new(
            RouteKey::new("q", TOWN),
            vec![at(TOWN, 0, 0), at(TOWN, 0, 1), at(TOWN, 0, 2)],
        );
        // (1, 1) is distance 2 from index 0 and index 2, distance 1 from index 1.
        assert_eq!(nearest_point(&route, &at(TOWN, 1, 1)), Some(1));
        let twin = RouteSegment::new(RouteKey::new("q", TOWN), vec![at(TOWN, 0, 0), at(TOWN, 0, 2)]);
        assert_eq!(nearest_point(&twin, &at(TOWN, 0, 1)), Some(0));
    }

    #[test]
    fn nearest_warp_prefers_destination_then_distance() {
        let store = store();
        let here = at(TOWN, 9, 9);
        assert_eq!(store.nearest_warp(TOWN, &here, HOUSE).unwrap().at, at(TOWN, 14, 14));
        // No warp leads to map 7, so the closest warp overall is used.
        assert_eq!(store.nearest_warp(TOWN, &here, MapId(7)).unwrap().at, at(TOWN, 8, 8));
        assert!(store.nearest_warp(LAB, &here, TOWN).is_none());
    }

    #[test]
    fn warp_at_matches_tiles() {
        let store = store();
        assert_eq!(store.warp_at(&at(TOWN, 14, 14)).unwrap().exit, Some(Direction::Up));
        assert!(store.warp_at(&at(TOWN, 14, 15)).is_none());
        assert_eq!(store.warp_count(), 2);
        assert_eq!(store.segment_count(), 2);
    }
}
