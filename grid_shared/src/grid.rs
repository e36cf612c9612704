//! Board geometry.
//!
//! The board is a fixed 10x10 array of cells. Each cell holds at most one
//! monster, referenced by id; the monster records live in the match state.
//!
//! Movement rules:
//! - A move is a straight or diagonal line of at most two cells.
//! - Intermediate cells are not inspected (monsters jump).
//!
//! Placement zones:
//! - player1 places on column 0, player2 on column 9,
//!   player3 on row 0, player4 on row 9.

use serde::{Deserialize, Serialize};

use crate::{monster::MonsterId, player::PlayerId};

/// Side length of the square board.
pub const BOARD_SIZE: usize = 10;

/// Longest legal move, in cells.
pub const MAX_MOVE_DISTANCE: usize = 2;

/// A board coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Pos { row, col }
    }

    pub fn in_bounds(self) -> bool {
        self.row < BOARD_SIZE && self.col < BOARD_SIZE
    }

    /// Row and column distance to `other`.
    pub fn delta(self, other: Pos) -> (usize, usize) {
        (self.row.abs_diff(other.row), self.col.abs_diff(other.col))
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Checks move geometry only; occupancy and ownership are the engine's job.
pub fn is_valid_move(from: Pos, to: Pos) -> bool {
    if !from.in_bounds() || !to.in_bounds() || from == to {
        return false;
    }
    let (dr, dc) = from.delta(to);
    let straight_or_diagonal = dr == 0 || dc == 0 || dr == dc;
    straight_or_diagonal && dr.max(dc) <= MAX_MOVE_DISTANCE
}

/// Whether `pos` lies on the edge reserved for `player`.
pub fn in_placement_zone(player: PlayerId, pos: Pos) -> bool {
    match player.seat() {
        1 => pos.col == 0,
        2 => pos.col == BOARD_SIZE - 1,
        3 => pos.row == 0,
        4 => pos.row == BOARD_SIZE - 1,
        _ => false,
    }
}

/// Cell occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grid {
    cells: [[Option<MonsterId>; BOARD_SIZE]; BOARD_SIZE],
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupant of a cell; `None` for empty or off-board cells.
    pub fn get(&self, pos: Pos) -> Option<MonsterId> {
        if !pos.in_bounds() {
            return None;
        }
        self.cells[pos.row][pos.col]
    }

    pub fn is_empty(&self, pos: Pos) -> bool {
        pos.in_bounds() && self.cells[pos.row][pos.col].is_none()
    }

    /// Puts `id` on a cell, returning the previous occupant.
    pub fn set(&mut self, pos: Pos, id: MonsterId) -> Option<MonsterId> {
        self.cells[pos.row][pos.col].replace(id)
    }

    pub fn clear(&mut self, pos: Pos) -> Option<MonsterId> {
        self.cells[pos.row][pos.col].take()
    }

    /// Occupied cells in row-major order.
    pub fn occupied(&self) -> impl Iterator<Item = (Pos, MonsterId)> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(c, cell)| cell.map(|id| (Pos::new(r, c), id)))
        })
    }

    /// Every on-board cell in row-major order.
    pub fn positions() -> impl Iterator<Item = Pos> {
        (0..BOARD_SIZE).flat_map(|r| (0..BOARD_SIZE).map(move |c| Pos::new(r, c)))
    }
}
