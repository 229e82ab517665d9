//! Coordinate model.
//!
//! Every map is placed in one shared global plane: a local tile `(row, col)` on a
//! map becomes `(row + origin_row + GLOBAL_PAD, col + origin_col + GLOBAL_PAD)`.
//! Because all maps share the plane, Manhattan distance between two global
//! coordinates is meaningful even across maps.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use questline_data::GLOBAL_PAD;

/// Numeric map identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub u32);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map {}", self.0)
    }
}

/// A position in the shared global plane, tagged with the map it belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalCoord {
    pub map: MapId,
    pub row: i32,
    pub col: i32,
}

impl GlobalCoord {
    pub fn new(map: MapId, row: i32, col: i32) -> Self {
        Self { map, row, col }
    }

    /// Manhattan distance on the global plane, saturating at `u32::MAX`. The map tag is ignored.
    pub fn manhattan(&self, other: &GlobalCoord) -> u32 {
        self.row.abs_diff(other.row).saturating_add(self.col.abs_diff(other.col))
    }

    /// `(row delta, col delta)` from `self` to `other`, saturating at the `i32` range.
    pub fn delta_to(&self, other: &GlobalCoord) -> (i32, i32) {
        (other.row.saturating_sub(self.row), other.col.saturating_sub(self.col))
    }

    /// Same tile, ignoring map identity.
    pub fn same_tile(&self, other: &GlobalCoord) -> bool {
        self.row == other.row && self.col == other.col
    }

    /// The neighbouring tile one step in `direction`, on the same map.
    /// Stays put at the edge of the `i32` plane.
    pub fn step(&self, direction: Direction) -> GlobalCoord {
        let (dr, dc) = direction.delta();
        GlobalCoord::new(self.map, self.row.saturating_add(dr), self.col.saturating_add(dc))
    }
}

impl fmt::Display for GlobalCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.map.0, self.row, self.col)
    }
}

/// A tile position relative to a map's own top-left corner.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalCoord {
    pub row: i32,
    pub col: i32,
}

impl LocalCoord {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

/// Unit grid moves. Rows grow downward.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// `(row delta, col delta)` for one step.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Direction that most reduces `(dr, dc)`.
    ///
    /// The axis with the larger absolute delta wins; equal deltas resolve to the
    /// row axis. Returns `None` for a zero delta.
    pub fn toward(dr: i32, dc: i32) -> Option<Direction> {
        if dr == 0 && dc == 0 {
            return None;
        }
        if dr.unsigned_abs() >= dc.unsigned_abs() {
            Some(if dr > 0 { Direction::Down } else { Direction::Up })
        } else {
            Some(if dc > 0 { Direction::Right } else { Direction::Left })
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<questline_data::DirectionDef> for Direction {
    fn from(def: questline_data::DirectionDef) -> Self {
        match def {
            questline_data::DirectionDef::Up => Direction::Up,
            questline_data::DirectionDef::Down => Direction::Down,
            questline_data::DirectionDef::Left => Direction::Left,
            questline_data::DirectionDef::Right => Direction::Right,
        }
    }
}

/// A coordinate conversion named a map that is not in the registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
#[error("unknown map id {0}")]
pub struct UnknownMapError(pub u32);

/// Placement of one map in the global plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapInfo {
    pub id: MapId,
    pub name: String,
    pub origin_row: i32,
    pub origin_col: i32,
    pub height: u32,
    pub width: u32,
    pub tileset: Option<String>,
}

impl MapInfo {
    /// Global row of the map's first local row.
    pub fn top(&self) -> i32 {
        self.origin_row.saturating_add(GLOBAL_PAD)
    }

    /// Global column of the map's first local column.
    pub fn left(&self) -> i32 {
        self.origin_col.saturating_add(GLOBAL_PAD)
    }

    /// Global row just past the map's last row.
    pub fn bottom(&self) -> i32 {
        self.top().saturating_add(i32::try_from(self.height).unwrap_or(i32::MAX))
    }

    /// Global column just past the map's last column.
    pub fn right(&self) -> i32 {
        self.left().saturating_add(i32::try_from(self.width).unwrap_or(i32::MAX))
    }

    pub fn contains(&self, coord: &GlobalCoord) -> bool {
        (self.top()..self.bottom()).contains(&coord.row) && (self.left()..self.right()).contains(&coord.col)
    }
}

/// All known maps, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapRegistry {
    maps: BTreeMap<MapId, MapInfo>,
}

impl MapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a map, replacing any previous entry with the same id.
    pub fn insert(&mut self, info: MapInfo) {
        self.maps.insert(info.id, info);
    }

    pub fn get(&self, map: MapId) -> Option<&MapInfo> {
        self.maps.get(&map)
    }

    /// Look up a map or fail with `UnknownMapError`.
    ///
    /// # Errors
    /// Returns `UnknownMapError` if the id is not registered.
    pub fn info(&self, map: MapId) -> Result<&MapInfo, UnknownMapError> {
        self.maps.get(&map).ok_or(UnknownMapError(map.0))
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MapInfo> {
        self.maps.values()
    }

    /// Convert a map-relative tile into its global representative.
    ///
    /// Positions beyond the `i32` plane saturate to its edge rather than wrap.
    ///
    /// # Errors
    /// Returns `UnknownMapError` if `map` is not registered.
    pub fn to_global(&self, map: MapId, local: LocalCoord) -> Result<GlobalCoord, UnknownMapError> {
        let info = self.info(map)?;
        Ok(GlobalCoord::new(
            map,
            local.row.saturating_add(info.top()),
            local.col.saturating_add(info.left()),
        ))
    }

    /// Convert a global coordinate back into its map-relative tile.
    ///
    /// # Errors
    /// Returns `UnknownMapError` if the coordinate's map is not registered.
    pub fn to_local(&self, coord: GlobalCoord) -> Result<LocalCoord, UnknownMapError> {
        let info = self.info(coord.map)?;
        Ok(LocalCoord::new(
            coord.row.saturating_sub(info.top()),
            coord.col.saturating_sub(info.left()),
        ))
    }

    /// True when the coordinate's map is known and the tile lies inside it.
    pub fn contains(&self, coord: &GlobalCoord) -> bool {
        self.get(coord.map).is_some_and(|info| info.contains(coord))
    }
}
