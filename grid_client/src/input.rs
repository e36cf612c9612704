//! Input handling.
//!
//! Turns console lines into player intents. Coordinates are zero-based
//! `row col` pairs, as printed on the board edges.

use grid_shared::{engine::Command, grid::Pos};

/// What a console line asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// A player intent for the rules engine.
    Play(Command),
    /// Print the board.
    Board,
    /// Print seats, tallies and whose turn it is.
    Status,
    Help,
    Quit,
}

/// Why a line could not be understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    Empty,
    Unknown(String),
    Usage(&'static str),
    BadNumber(String),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::Empty => f.write_str("empty command"),
            InputError::Unknown(cmd) => write!(f, "unknown command '{cmd}', try 'help'"),
            InputError::Usage(usage) => write!(f, "usage: {usage}"),
            InputError::BadNumber(tok) => write!(f, "'{tok}' is not a board coordinate"),
        }
    }
}

impl std::error::Error for InputError {}

pub const HELP: &[&str] = &[
    "place <row> <col>                 - place a new monster",
    "move <row> <col> <to_row> <to_col> - move or attack",
    "end                               - end your turn",
    "board                             - show the board",
    "status                            - show seats and turn",
    "quit                              - leave",
];

fn coords<const N: usize>(args: &[&str], usage: &'static str) -> Result<[usize; N], InputError> {
    if args.len() != N {
        return Err(InputError::Usage(usage));
    }
    let mut out = [0; N];
    for (slot, tok) in out.iter_mut().zip(args) {
        *slot = tok
            .parse()
            .map_err(|_| InputError::BadNumber(tok.to_string()))?;
    }
    Ok(out)
}

/// Parses one console line.
pub fn parse_line(line: &str) -> Result<Action, InputError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((cmd, args)) = tokens.split_first() else {
        return Err(InputError::Empty);
    };

    match cmd.to_ascii_lowercase().as_str() {
        "place" | "p" => {
            let [row, col] = coords(args, "place <row> <col>")?;
            Ok(Action::Play(Command::place(Pos::new(row, col))))
        }
        "move" | "m" => {
            let [fr, fc, tr, tc] = coords(args, "move <row> <col> <to_row> <to_col>")?;
            Ok(Action::Play(Command::move_monster(
                Pos::new(fr, fc),
                Pos::new(tr, tc),
            )))
        }
        "end" | "e" => Ok(Action::Play(Command::EndTurn)),
        "board" | "b" => Ok(Action::Board),
        "status" => Ok(Action::Status),
        "help" | "?" => Ok(Action::Help),
        "quit" | "exit" => Ok(Action::Quit),
        other => Err(InputError::Unknown(other.to_string())),
    }
}
