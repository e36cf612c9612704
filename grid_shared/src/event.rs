//! Game events and observers.
//!
//! The engine records what happened during a command as a list of
//! [`GameEvent`]s and hands them, together with the resulting state, to every
//! registered [`MatchObserver`]. The same events are returned to the caller.
//! - Server: an observer queues a snapshot broadcast.
//! - Client (hotseat): the returned events are printed and the board redrawn.

use serde::{Deserialize, Serialize};

use crate::{
    grid::Pos,
    monster::{Clash, MonsterId, MonsterKind},
    player::PlayerId,
    state::MatchState,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted {
        /// 1-based match number.
        game: u32,
        first: PlayerId,
    },
    MonsterPlaced {
        id: MonsterId,
        owner: PlayerId,
        kind: MonsterKind,
        pos: Pos,
    },
    MonsterMoved {
        id: MonsterId,
        from: Pos,
        to: Pos,
    },
    Combat {
        attacker: MonsterId,
        defender: MonsterId,
        outcome: Clash,
    },
    MonsterRemoved {
        id: MonsterId,
        owner: PlayerId,
        pos: Pos,
    },
    PlayerEliminated {
        player: PlayerId,
    },
    RoundCompleted {
        next_order: Vec<PlayerId>,
    },
    TurnStarted {
        player: PlayerId,
    },
    GameOver {
        /// `None` when the last seats fell together.
        winner: Option<PlayerId>,
        game: u32,
    },
}

impl std::fmt::Display for GameEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameEvent::GameStarted { game, first } => {
                write!(f, "game {game} started, {first} goes first")
            }
            GameEvent::MonsterPlaced {
                owner, kind, pos, ..
            } => write!(f, "{owner} placed a {kind} at {pos}"),
            GameEvent::MonsterMoved { from, to, .. } => write!(f, "monster moved {from} -> {to}"),
            GameEvent::Combat { outcome, .. } => match outcome {
                Clash::AttackerWins => f.write_str("the attacker wins the fight"),
                Clash::DefenderWins => f.write_str("the defender wins the fight"),
                Clash::MutualDestruction => f.write_str("both monsters fall"),
            },
            GameEvent::MonsterRemoved { owner, pos, .. } => {
                write!(f, "{owner} lost a monster at {pos}")
            }
            GameEvent::PlayerEliminated { player } => write!(f, "{player} has been eliminated"),
            GameEvent::RoundCompleted { next_order } => {
                let order: Vec<String> = next_order.iter().map(|p| p.to_string()).collect();
                write!(f, "round complete, next order: {}", order.join(", "))
            }
            GameEvent::TurnStarted { player } => write!(f, "{player} to move"),
            GameEvent::GameOver {
                winner: Some(winner),
                ..
            } => write!(f, "{winner} wins!"),
            GameEvent::GameOver { winner: None, .. } => f.write_str("nobody survives, draw"),
        }
    }
}

/// Receives the state after every accepted mutation.
pub trait MatchObserver: Send {
    fn on_update(&mut self, state: &MatchState, events: &[GameEvent]);
}

/// Observer that just remembers events, for tests and replays.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<GameEvent>,
    updates: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Number of notifications received.
    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl MatchObserver for EventLog {
    fn on_update(&mut self, _state: &MatchState, events: &[GameEvent]) {
        self.updates += 1;
        self.events.extend_from_slice(events);
    }
}

/// Shared handle so a test can keep reading a log the engine owns.
impl MatchObserver for std::sync::Arc<std::sync::Mutex<EventLog>> {
    fn on_update(&mut self, state: &MatchState, events: &[GameEvent]) {
        if let Ok(mut log) = self.lock() {
            log.on_update(state, events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_tag() {
        let ev = GameEvent::PlayerEliminated {
            player: PlayerId::new(3),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "player_eliminated");
        assert_eq!(json["player"], 3);
    }

    #[test]
    fn display_reads_like_a_log_line() {
        let ev = GameEvent::GameOver {
            winner: Some(PlayerId::new(2)),
            game: 1,
        };
        assert_eq!(ev.to_string(), "player2 wins!");
        let draw = GameEvent::GameOver {
            winner: None,
            game: 2,
        };
        assert_eq!(draw.to_string(), "nobody survives, draw");
    }
}
