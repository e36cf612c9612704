//! Local hotseat play.
//!
//! Both seats share one terminal. Every command is issued on behalf of the
//! seat whose turn it is, so the engine's turn authority never rejects it.

use std::time::Duration;

use grid_shared::{
    config::{GameConfig, RuleSet},
    engine::Engine,
    rng::{GameRng, RandomSource},
};
use tracing::info;

use crate::{
    input::{parse_line, Action, HELP},
    render::{render_board, render_status},
};

/// An in-process match driven by console lines.
pub struct LocalGame {
    engine: Engine,
    restart_delay: Duration,
    quit: bool,
}

impl LocalGame {
    /// Duel rules with the seed and restart delay from `cfg`.
    pub fn new(cfg: &GameConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => GameRng::new(seed),
            None => GameRng::from_entropy(),
        };
        info!(seed = rng.seed(), "Local duel");
        Self::with_rng(RuleSet::duel(), rng, cfg.restart_delay())
    }

    pub fn with_rng(
        rules: RuleSet,
        rng: impl RandomSource + 'static,
        restart_delay: Duration,
    ) -> Self {
        Self {
            engine: Engine::new(rules, rng),
            restart_delay,
            quit: false,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn finished(&self) -> bool {
        !self.engine.state().in_progress()
    }

    pub fn wants_quit(&self) -> bool {
        self.quit
    }

    pub fn restart_delay(&self) -> Duration {
        self.restart_delay
    }

    /// The board followed by the status lines.
    pub fn view(&self) -> Vec<String> {
        let snap = self.engine.state().snapshot();
        let mut out: Vec<String> = render_board(&snap).lines().map(str::to_string).collect();
        out.extend(render_status(&snap, None));
        out
    }

    /// Runs one console line and returns what to print.
    pub fn exec(&mut self, line: &str) -> Vec<String> {
        let action = match parse_line(line) {
            Ok(action) => action,
            Err(e) => return vec![e.to_string()],
        };

        match action {
            Action::Play(command) => {
                let seat = self.engine.state().current_turn();
                match self.engine.apply(seat, command) {
                    Ok(events) => {
                        let mut out: Vec<String> = events.iter().map(|e| e.to_string()).collect();
                        out.extend(self.view());
                        out
                    }
                    Err(e) => vec![format!("{seat}: {e}")],
                }
            }
            Action::Board => render_board(&self.engine.state().snapshot())
                .lines()
                .map(str::to_string)
                .collect(),
            Action::Status => render_status(&self.engine.state().snapshot(), None),
            Action::Help => HELP.iter().map(|l| l.to_string()).collect(),
            Action::Quit => {
                self.quit = true;
                vec!["Bye".to_string()]
            }
        }
    }

    /// Replaces the finished match with a fresh one.
    pub fn restart(&mut self) -> Vec<String> {
        let mut out: Vec<String> = self
            .engine
            .start_new_game()
            .iter()
            .map(|e| e.to_string())
            .collect();
        out.extend(self.view());
        out
    }
}
