//! Monsters and the predator cycle.
//!
//! Vampire beats Werewolf, Werewolf beats Ghost, Ghost beats Vampire.
//! Two monsters of the same kind destroy each other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{grid::Pos, player::PlayerId};

/// Stable monster id, allocated by the engine in placement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonsterId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonsterKind {
    Vampire,
    Werewolf,
    Ghost,
}

impl MonsterKind {
    /// Kinds in draw order; a random index into this picks a kind.
    pub const ALL: [MonsterKind; 3] = [
        MonsterKind::Vampire,
        MonsterKind::Werewolf,
        MonsterKind::Ghost,
    ];

    /// The kind this one defeats.
    pub fn prey(self) -> MonsterKind {
        match self {
            MonsterKind::Vampire => MonsterKind::Werewolf,
            MonsterKind::Werewolf => MonsterKind::Ghost,
            MonsterKind::Ghost => MonsterKind::Vampire,
        }
    }

    /// The kind that defeats this one.
    pub fn predator(self) -> MonsterKind {
        match self {
            MonsterKind::Vampire => MonsterKind::Ghost,
            MonsterKind::Werewolf => MonsterKind::Vampire,
            MonsterKind::Ghost => MonsterKind::Werewolf,
        }
    }

    pub fn beats(self, other: MonsterKind) -> bool {
        self.prey() == other
    }

    /// Single-letter tag for text boards.
    pub fn letter(self) -> char {
        match self {
            MonsterKind::Vampire => 'V',
            MonsterKind::Werewolf => 'W',
            MonsterKind::Ghost => 'G',
        }
    }
}

impl fmt::Display for MonsterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonsterKind::Vampire => "vampire",
            MonsterKind::Werewolf => "werewolf",
            MonsterKind::Ghost => "ghost",
        };
        f.write_str(name)
    }
}

/// Result of an attack on an enemy monster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clash {
    /// Defender removed, attacker takes the cell.
    AttackerWins,
    /// Attacker removed, defender holds the cell.
    DefenderWins,
    /// Same kind: both removed.
    MutualDestruction,
}

/// Resolves an attack purely from the two kinds.
pub fn resolve_clash(attacker: MonsterKind, defender: MonsterKind) -> Clash {
    if attacker == defender {
        Clash::MutualDestruction
    } else if attacker.beats(defender) {
        Clash::AttackerWins
    } else {
        Clash::DefenderWins
    }
}

/// A live monster on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster {
    pub id: MonsterId,
    pub kind: MonsterKind,
    pub owner: PlayerId,
    pub pos: Pos,
}
