//! Text rendering.
//!
//! The server sends full snapshots; the terminal client redraws the whole
//! board from the newest one. Each cell prints as the monster letter followed
//! by the owner's seat (`V1`, `G3`), or `.` when empty.

use std::fmt::Write as _;

use grid_shared::{
    grid::{Pos, BOARD_SIZE},
    player::PlayerId,
    state::{MatchSnapshot, Phase},
};

/// Draws the grid with row and column numbers on the edges.
///
/// The most recently placed monster is marked with `*`.
pub fn render_board(snap: &MatchSnapshot) -> String {
    let mut out = String::from("   ");
    for col in 0..BOARD_SIZE {
        let _ = write!(out, "{col:>3}");
    }
    out.push('\n');

    for row in 0..BOARD_SIZE {
        let _ = write!(out, "{row:>3}");
        for col in 0..BOARD_SIZE {
            let pos = Pos::new(row, col);
            let marker = if snap.last_placed == Some(pos) { '*' } else { ' ' };
            match snap.cell(pos) {
                Some(cell) => {
                    let _ = write!(out, "{marker}{}{}", cell.kind.letter(), cell.owner.seat());
                }
                None => {
                    let _ = write!(out, "{marker} .");
                }
            }
        }
        out.push('\n');
    }
    out
}

/// One line per seat plus a header saying whose turn it is.
pub fn render_status(snap: &MatchSnapshot, me: Option<PlayerId>) -> Vec<String> {
    let mut out = Vec::new();
    let game = snap.game_count + u32::from(snap.in_progress);
    match (snap.phase, snap.winner) {
        (Phase::Over, Some(winner)) => out.push(format!("Game {game}: {winner} wins!")),
        (Phase::Over, None) => out.push(format!("Game {game}: nobody survives, draw")),
        (phase, _) => {
            let whose = if Some(snap.current_turn) == me {
                "your turn".to_string()
            } else {
                format!("{}'s turn", snap.current_turn)
            };
            out.push(format!("Game {game} ({phase:?}): {whose}"));
        }
    }

    for p in &snap.players {
        let you = if Some(p.seat) == me { " (you)" } else { "" };
        let state = if p.eliminated { " eliminated" } else { "" };
        out.push(format!(
            "  {}{you}: {} monsters, {} lost, {} wins{state}",
            p.seat, p.monsters, p.eliminations, p.wins
        ));
    }
    out
}
