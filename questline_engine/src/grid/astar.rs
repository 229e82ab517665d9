//! A* search over a [`Viewport`].
//!
//! Unit cost per legal step, Manhattan heuristic. Open-set ties are broken by
//! lowest heuristic, then by the direction used to reach the node (down, up,
//! right, left), then by insertion order, so equal inputs give equal paths.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, trace};

use super::{Cell, LedgeFidelity, TransitionRules, Viewport};
use crate::coords::Direction;

/// Expansion order, which doubles as the tie-break rank.
const SEARCH_ORDER: [Direction; 4] = [Direction::Down, Direction::Up, Direction::Right, Direction::Left];

#[derive(Debug, Clone, Copy)]
struct SearchNode {
    f: u32,
    h: u32,
    rank: u8,
    seq: u64,
    g: u32,
    cell: Cell,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the smallest key first.
        (other.f, other.h, other.rank, other.seq).cmp(&(self.f, self.h, self.rank, self.seq))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest-path search over one viewport snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Pathfinder<'a> {
    grid: &'a Viewport,
    rules: Option<&'a TransitionRules>,
}

impl<'a> Pathfinder<'a> {
    /// `rules` is `None` when no tile-pair data exists for the current tileset.
    pub fn new(grid: &'a Viewport, rules: Option<&'a TransitionRules>) -> Self {
        Self { grid, rules }
    }

    pub fn fidelity(&self) -> LedgeFidelity {
        if self.rules.is_some() {
            LedgeFidelity::Full
        } else {
            LedgeFidelity::WallsAndOccupantsOnly
        }
    }

    /// Whether one step from `from` in `direction` is legal.
    pub fn can_step(&self, from: Cell, direction: Direction) -> Option<Cell> {
        let to = self.grid.neighbour(from, direction)?;
        let dest = self.grid.tile(to)?;
        if !dest.is_walkable() {
            return None;
        }
        if let Some(rules) = self.rules {
            let source = self.grid.tile(from)?;
            if !rules.allows(source.tile, dest.tile, direction) {
                return None;
            }
        }
        Some(to)
    }

    /// Unit moves from `start` to `goal`, or `None` if the goal cannot be reached.
    ///
    /// The goal is clamped to the viewport first. An empty path means `start` is
    /// already the goal.
    pub fn find_path(&self, start: Cell, goal: Cell) -> Option<Vec<Direction>> {
        let grid = self.grid;
        if grid.tile(start).is_none() {
            return None;
        }
        let goal = Cell::new(
            goal.row.min(grid.rows().saturating_sub(1)),
            goal.col.min(grid.cols().saturating_sub(1)),
        );
        if start == goal {
            return Some(Vec::new());
        }
        if self.fidelity() == LedgeFidelity::WallsAndOccupantsOnly {
            debug!("local search without tile-pair data: ledges are not enforced");
        }

        let index = |cell: Cell| cell.row * grid.cols() + cell.col;
        let size = grid.rows() * grid.cols();
        let mut best_g = vec![u32::MAX; size];
        let mut came_from: Vec<Option<(Cell, Direction)>> = vec![None; size];
        let mut closed = vec![false; size];
        let mut open = BinaryHeap::new();
        let mut seq = 0u64;

        best_g[index(start)] = 0;
        let h = start.manhattan(&goal);
        open.push(SearchNode {
            f: h,
            h,
            rank: 0,
            seq,
            g: 0,
            cell: start,
        });

        while let Some(node) = open.pop() {
            let current = node.cell;
            if closed[index(current)] {
                continue;
            }
            closed[index(current)] = true;

            if current == goal {
                let path = rebuild(&came_from, index, start, goal);
                trace!("path {:?} -> {:?}: {} steps", start, goal, path.len());
                return Some(path);
            }

            for (rank, direction) in SEARCH_ORDER.iter().enumerate() {
                let Some(next) = self.can_step(current, *direction) else {
                    continue;
                };
                if closed[index(next)] {
                    continue;
                }
                let g = node.g + 1;
                if g >= best_g[index(next)] {
                    continue;
                }
                best_g[index(next)] = g;
                came_from[index(next)] = Some((current, *direction));
                let h = next.manhattan(&goal);
                seq += 1;
                open.push(SearchNode {
                    f: g + h,
                    h,
                    rank: u8::try_from(rank).unwrap_or(u8::MAX),
                    seq,
                    g,
                    cell: next,
                });
            }
        }

        debug!("no local path from {start:?} to {goal:?}");
        None
    }
}

fn rebuild(
    came_from: &[Option<(Cell, Direction)>],
    index: impl Fn(Cell) -> usize,
    start: Cell,
    goal: Cell,
) -> Vec<Direction> {
    let mut moves = Vec::new();
    let mut cursor = goal;
    while cursor != start {
        let Some((prev, direction)) = came_from[index(cursor)] else {
            break;
        };
        moves.push(direction);
        cursor = prev;
    }
    moves.reverse();
    moves
}
