//! Local grid module --
//!
//! A bounded viewport snapshot around the agent (passability, moving occupants and
//! tile ids) plus the per-tileset transition rules used to honour ledges.
//! The search itself lives in [`astar`].

pub mod astar;

pub use astar::Pathfinder;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::{Direction, GlobalCoord};
use questline_data::TilesetDef;

/// Default viewport height in tiles.
pub const DEFAULT_ROWS: usize = 9;
/// Default viewport width in tiles.
pub const DEFAULT_COLS: usize = 10;

/// A cell index inside a viewport.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn manhattan(&self, other: &Cell) -> u32 {
        let d = self.row.abs_diff(other.row) + self.col.abs_diff(other.col);
        u32::try_from(d).unwrap_or(u32::MAX)
    }
}

/// One tile of the viewport snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTile {
    pub passable: bool,
    /// A sprite or other moving obstacle currently stands here.
    #[serde(default)]
    pub occupied: bool,
    /// Background tile id, when the provider knows it.
    #[serde(default)]
    pub tile: Option<u16>,
}

impl LocalTile {
    pub const OPEN: LocalTile = LocalTile {
        passable: true,
        occupied: false,
        tile: None,
    };
    pub const WALL: LocalTile = LocalTile {
        passable: false,
        occupied: false,
        tile: None,
    };

    pub fn is_walkable(&self) -> bool {
        self.passable && !self.occupied
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("viewport rows have different widths")]
    Ragged,
    #[error("viewport has no '@' anchor cell")]
    MissingAnchor,
    #[error("unknown viewport glyph '{0}'")]
    UnknownGlyph(char),
}

/// Row-major tile snapshot anchored on the agent's own cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    rows: usize,
    cols: usize,
    anchor: Cell,
    tiles: Vec<LocalTile>,
}

impl Viewport {
    /// An all-open viewport with the anchor at `anchor`.
    pub fn open(rows: usize, cols: usize, anchor: Cell) -> Self {
        Self {
            rows,
            cols,
            anchor,
            tiles: vec![LocalTile::OPEN; rows * cols],
        }
    }

    /// Build a viewport from text rows.
    ///
    /// `.` is open ground, `#` a wall, `o` an occupant and `@` the agent (open).
    ///
    /// # Errors
    /// Fails on ragged rows, a missing `@`, or an unknown glyph.
    pub fn from_ascii<S: AsRef<str>>(lines: &[S]) -> Result<Self, GridError> {
        let cols = lines.first().map_or(0, |l| l.as_ref().chars().count());
        let mut tiles = Vec::with_capacity(lines.len() * cols);
        let mut anchor = None;
        for (row, line) in lines.iter().enumerate() {
            let line = line.as_ref();
            if line.chars().count() != cols {
                return Err(GridError::Ragged);
            }
            for (col, glyph) in line.chars().enumerate() {
                let tile = match glyph {
                    '.' => LocalTile::OPEN,
                    '#' => LocalTile::WALL,
                    'o' => LocalTile {
                        occupied: true,
                        ..LocalTile::OPEN
                    },
                    '@' => {
                        anchor = Some(Cell::new(row, col));
                        LocalTile::OPEN
                    },
                    other => return Err(GridError::UnknownGlyph(other)),
                };
                tiles.push(tile);
            }
        }
        Ok(Self {
            rows: lines.len(),
            cols,
            anchor: anchor.ok_or(GridError::MissingAnchor)?,
            tiles,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The cell the agent occupies.
    pub fn anchor(&self) -> Cell {
        self.anchor
    }

    /// Deserialized snapshots are not checked on the way in.
    pub fn is_well_formed(&self) -> bool {
        self.rows.checked_mul(self.cols) == Some(self.tiles.len())
            && self.anchor.row < self.rows
            && self.anchor.col < self.cols
    }

    pub fn tile(&self, cell: Cell) -> Option<&LocalTile> {
        if cell.row < self.rows && cell.col < self.cols {
            self.tiles.get(cell.row.checked_mul(self.cols)?.checked_add(cell.col)?)
        } else {
            None
        }
    }

    /// Replace a tile; out-of-bounds cells are ignored.
    pub fn set_tile(&mut self, cell: Cell, tile: LocalTile) {
        if cell.row < self.rows && cell.col < self.cols {
            let slot = cell
                .row
                .checked_mul(self.cols)
                .and_then(|base| base.checked_add(cell.col))
                .and_then(|idx| self.tiles.get_mut(idx));
            if let Some(slot) = slot {
                *slot = tile;
            }
        }
    }

    /// Record the background tile id of a cell.
    pub fn set_tile_id(&mut self, cell: Cell, id: u16) {
        if let Some(tile) = self.tile(cell).copied() {
            self.set_tile(cell, LocalTile { tile: Some(id), ..tile });
        }
    }

    /// The neighbour of `cell` one step in `direction`, if inside the viewport.
    pub fn neighbour(&self, cell: Cell, direction: Direction) -> Option<Cell> {
        let (dr, dc) = direction.delta();
        let row = cell.row.checked_add_signed(dr as isize)?;
        let col = cell.col.checked_add_signed(dc as isize)?;
        (row < self.rows && col < self.cols).then_some(Cell::new(row, col))
    }

    /// Cell for `target` given that the anchor sits on `position`, clamped to the viewport.
    pub fn cell_toward(&self, position: &GlobalCoord, target: &GlobalCoord) -> Cell {
        let (dr, dc) = position.delta_to(target);
        let clamp = |base: usize, delta: i32, len: usize| -> usize {
            let max = len.saturating_sub(1) as i64;
            (base as i64 + i64::from(delta)).clamp(0, max) as usize
        };
        Cell::new(clamp(self.anchor.row, dr, self.rows), clamp(self.anchor.col, dc, self.cols))
    }
}

/// How much of the ledge data the pathfinder can enforce.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgeFidelity {
    /// Walls, occupants and tile-pair rules are all enforced.
    Full,
    /// No tile-pair data: ledges may be crossed the wrong way.
    WallsAndOccupantsOnly,
}

/// Tile-pair rules for one tileset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionRules {
    impassable: HashSet<(u16, u16)>,
    one_way: HashMap<(u16, u16), Direction>,
}

impl TransitionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forbid crossing between `a` and `b` in both directions.
    pub fn block_pair(&mut self, a: u16, b: u16) {
        self.impassable.insert((a, b));
        self.impassable.insert((b, a));
    }

    /// Allow `from -> to` only while moving in `allowed`; `to -> from` is always illegal.
    pub fn add_one_way(&mut self, from: u16, to: u16, allowed: Direction) {
        self.one_way.insert((from, to), allowed);
    }

    /// Whether a step between two tiles is legal. Unknown tile ids are permissive.
    pub fn allows(&self, from: Option<u16>, to: Option<u16>, moving: Direction) -> bool {
        let (Some(from), Some(to)) = (from, to) else {
            return true;
        };
        if self.impassable.contains(&(from, to)) {
            return false;
        }
        if let Some(allowed) = self.one_way.get(&(from, to)) {
            return *allowed == moving;
        }
        !self.one_way.contains_key(&(to, from))
    }

    pub fn len(&self) -> usize {
        self.impassable.len() / 2 + self.one_way.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impassable.is_empty() && self.one_way.is_empty()
    }
}

impl From<&TilesetDef> for TransitionRules {
    fn from(def: &TilesetDef) -> Self {
        let mut rules = TransitionRules::new();
        for (a, b) in &def.impassable {
            rules.block_pair(*a, *b);
        }
        for ledge in &def.one_way {
            rules.add_one_way(ledge.from, ledge.to, ledge.allowed.into());
        }
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::MapId;

    #[test]
    fn ascii_viewport_parses_glyphs() {
        let grid = Viewport::from_ascii(&["..#", ".@o"]).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (2, 3));
        assert_eq!(grid.anchor(), Cell::new(1, 1));
        assert!(!grid.tile(Cell::new(0, 2)).unwrap().passable);
        assert!(grid.tile(Cell::new(1, 2)).unwrap().occupied);
        assert!(grid.is_well_formed());
    }

    #[test]
    fn ascii_viewport_rejects_bad_input() {
        assert_eq!(Viewport::from_ascii(&["..", "."]), Err(GridError::Ragged));
        assert_eq!(Viewport::from_ascii(&["..", ".."]), Err(GridError::MissingAnchor));
        assert_eq!(Viewport::from_ascii(&["@x"]), Err(GridError::UnknownGlyph('x')));
    }

    #[test]
    fn oversized_snapshot_is_not_well_formed() {
        let text = format!("(rows: {}, cols: 2, anchor: (row: 0, col: 0), tiles: [])", usize::MAX);
        let grid: Viewport = ron::from_str(&text).unwrap();
        assert!(!grid.is_well_formed());
        assert_eq!(grid.tile(Cell::new(usize::MAX - 1, 1)), None);
    }

    #[test]
    fn cell_toward_clamps_to_bounds() {
        let grid = Viewport::open(DEFAULT_ROWS, DEFAULT_COLS, Cell::new(4, 4));
        let here = GlobalCoord::new(MapId(1), 30, 30);
        assert_eq!(grid.cell_toward(&here, &GlobalCoord::new(MapId(1), 31, 28)), Cell::new(5, 2));
        assert_eq!(grid.cell_toward(&here, &GlobalCoord::new(MapId(1), 10, 60)), Cell::new(0, 9));
    }

    #[test]
    fn neighbour_stays_inside() {
        let grid = Viewport::open(3, 3, Cell::new(0, 0));
        assert_eq!(grid.neighbour(Cell::new(0, 0), Direction::Up), None);
        assert_eq!(grid.neighbour(Cell::new(0, 0), Direction::Right), Some(Cell::new(0, 1)));
        assert_eq!(grid.neighbour(Cell::new(2, 2), Direction::Down), None);
    }

    #[test]
    fn transition_rules_enforce_ledges_and_pairs() {
        let mut rules = TransitionRules::new();
        rules.block_pair(10, 11);
        rules.add_one_way(20, 21, Direction::Down);

        assert!(!rules.allows(Some(10), Some(11), Direction::Right));
        assert!(!rules.allows(Some(11), Some(10), Direction::Left));
        assert!(rules.allows(Some(20), Some(21), Direction::Down));
        assert!(!rules.allows(Some(20), Some(21), Direction::Left));
        assert!(!rules.allows(Some(21), Some(20), Direction::Up));
        assert!(rules.allows(None, Some(21), Direction::Up));
        assert!(rules.allows(Some(1), Some(2), Direction::Up));
    }
}
