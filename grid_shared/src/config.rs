//! Configuration system.
//!
//! Loads game configuration from JSON strings/files. Command-line flags are
//! layered on top by the binaries.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Match rules. The two shipped variants are [`RuleSet::duel`] and
/// [`RuleSet::melee`].
///
/// Fields left out of a config file come from the preset for its seat count,
/// so `{"players": 2}` still ends a duel at ten losses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RuleSetFile")]
pub struct RuleSet {
    /// Number of seats (2 or 4).
    pub players: u8,
    /// Restrict placement to each seat's board edge.
    pub placement_zones: bool,
    /// Losing this many monsters eliminates a player outright.
    pub elimination_limit: Option<u32>,
    /// Upper bound on seat advancement attempts when skipping eliminated seats.
    pub max_turn_advance: u32,
}

/// On-disk shape of [`RuleSet`]; every field but `players` is optional.
#[derive(Deserialize)]
struct RuleSetFile {
    players: u8,
    placement_zones: Option<bool>,
    elimination_limit: Option<u32>,
    max_turn_advance: Option<u32>,
}

impl From<RuleSetFile> for RuleSet {
    fn from(file: RuleSetFile) -> Self {
        let preset = RuleSet::for_players(file.players);
        Self {
            players: file.players,
            placement_zones: file.placement_zones.unwrap_or(preset.placement_zones),
            elimination_limit: file.elimination_limit.or(preset.elimination_limit),
            max_turn_advance: file.max_turn_advance.unwrap_or(preset.max_turn_advance),
        }
    }
}

fn default_max_turn_advance() -> u32 {
    100
}

impl RuleSet {
    /// Two-player hotseat rules: edge zones, ten losses and you are out.
    pub fn duel() -> Self {
        Self {
            players: 2,
            placement_zones: true,
            elimination_limit: Some(10),
            max_turn_advance: default_max_turn_advance(),
        }
    }

    /// Four-player server rules: last seat with monsters wins.
    pub fn melee() -> Self {
        Self {
            players: 4,
            placement_zones: true,
            elimination_limit: None,
            max_turn_advance: default_max_turn_advance(),
        }
    }

    /// Default rules for a seat count.
    pub fn for_players(players: u8) -> Self {
        if players <= 2 {
            Self::duel()
        } else {
            Self {
                players,
                ..Self::melee()
            }
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::melee()
    }
}

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Server listen address, e.g. `127.0.0.1:40000`.
    pub server_addr: String,
    /// Delay before a fresh match replaces a finished one.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Fixed RNG seed; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub rules: RuleSet,
}

fn default_restart_delay_ms() -> u64 {
    2000
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            restart_delay_ms: default_restart_delay_ms(),
            seed: None,
            rules: RuleSet::default(),
        }
    }
}

impl GameConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn restart_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.restart_delay_ms)
    }

    /// Checks values the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let players = self.rules.players;
        if !(2..=crate::player::MAX_PLAYERS).contains(&players) {
            anyhow::bail!("players must be between 2 and 4, got {players}");
        }
        if self.rules.max_turn_advance == 0 {
            anyhow::bail!("max_turn_advance must be positive");
        }
        Ok(())
    }
}
