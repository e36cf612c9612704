//! Rules engine.
//!
//! [`Engine`] owns one [`MatchState`] and is the only thing that mutates it.
//! Every command either fails with a [`CommandError`] and leaves the state
//! untouched, or succeeds and notifies all observers with the events it
//! produced.
//!
//! Turn flow:
//! - Round one (`Placing`): each seat places one monster; any accepted action
//!   hands the turn to the next seat.
//! - Later rounds (`Active`): a seat may move each of its monsters once and
//!   place at most one monster per round. Placing ends the turn.
//! - At every round boundary the turn order is rebuilt: the seat with the
//!   fewest monsters on the board starts, ties broken at random.
//! - A seat with no monsters left after round one is eliminated; the last
//!   seat standing wins.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::RuleSet,
    event::{GameEvent, MatchObserver},
    grid::{in_placement_zone, is_valid_move, Grid, Pos},
    monster::{resolve_clash, Clash, Monster, MonsterId, MonsterKind},
    player::PlayerId,
    rng::RandomSource,
    state::{MatchState, Phase},
};

/// Placements each seat gets per round.
pub const PLACEMENTS_PER_ROUND: u32 = 1;

/// A player intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    PlaceMonster {
        row: usize,
        col: usize,
    },
    #[serde(rename_all = "camelCase")]
    MoveMonster {
        from_row: usize,
        from_col: usize,
        to_row: usize,
        to_col: usize,
    },
    EndTurn,
}

impl Command {
    pub fn place(pos: Pos) -> Self {
        Command::PlaceMonster {
            row: pos.row,
            col: pos.col,
        }
    }

    pub fn move_monster(from: Pos, to: Pos) -> Self {
        Command::MoveMonster {
            from_row: from.row,
            from_col: from.col,
            to_row: to.row,
            to_col: to.col,
        }
    }
}

/// Why a command was refused. None of these change the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    GameOver,
    NotYourTurn,
    Eliminated,
    UnknownSeat,
    OutOfBounds,
    CellOccupied,
    OutsideZone,
    QuotaExceeded,
    NoMonster,
    NotOwner,
    AlreadyMoved,
    JustPlaced,
    IllegalMove,
    FriendlyFire,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            CommandError::GameOver => "game is over",
            CommandError::NotYourTurn => "not your turn",
            CommandError::Eliminated => "you are eliminated",
            CommandError::UnknownSeat => "no such seat",
            CommandError::OutOfBounds => "cell is off the board",
            CommandError::CellOccupied => "cell is occupied",
            CommandError::OutsideZone => "you can only place on your own edge",
            CommandError::QuotaExceeded => "already placed this round",
            CommandError::NoMonster => "no monster there",
            CommandError::NotOwner => "that monster is not yours",
            CommandError::AlreadyMoved => "that monster already moved this turn",
            CommandError::JustPlaced => "a monster cannot move on the turn it was placed",
            CommandError::IllegalMove => "moves go straight or diagonal, at most two cells",
            CommandError::FriendlyFire => "cannot attack your own monster",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for CommandError {}

/// The game engine: one match at a time, counters carried across matches.
pub struct Engine {
    rules: RuleSet,
    state: MatchState,
    rng: Box<dyn RandomSource>,
    observers: Vec<Box<dyn MatchObserver>>,
    pending: Vec<GameEvent>,
}

impl Engine {
    /// Creates an engine with the first match already set up.
    pub fn new(rules: RuleSet, rng: impl RandomSource + 'static) -> Self {
        let mut engine = Self {
            state: MatchState::new(rules.players),
            rules,
            rng: Box::new(rng),
            observers: Vec::new(),
            pending: Vec::new(),
        };
        engine.begin_match();
        engine.pending.clear();
        engine
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Registers an observer for every future mutation.
    pub fn subscribe(&mut self, observer: impl MatchObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Runs a command on behalf of `seat`, enforcing turn authority.
    pub fn apply(&mut self, seat: PlayerId, cmd: Command) -> Result<Vec<GameEvent>, CommandError> {
        let result = self.dispatch(seat, cmd);
        if let Err(e) = result {
            debug!(%seat, ?cmd, reason = %e, "Command rejected");
        }
        self.commit(result)
    }

    /// Places a monster for `player`. Turn ownership is not checked here.
    pub fn place(&mut self, player: PlayerId, pos: Pos) -> Result<Vec<GameEvent>, CommandError> {
        let result = self.do_place(player, pos);
        self.commit(result)
    }

    /// Moves (and possibly fights with) a monster of `player`.
    pub fn move_monster(
        &mut self,
        player: PlayerId,
        from: Pos,
        to: Pos,
    ) -> Result<Vec<GameEvent>, CommandError> {
        let result = self.do_move(player, from, to);
        self.commit(result)
    }

    /// Ends the current turn unconditionally.
    pub fn end_turn(&mut self) -> Result<Vec<GameEvent>, CommandError> {
        let result = self.do_end_turn();
        self.commit(result)
    }

    /// Replaces the finished (or running) match with a fresh one.
    pub fn start_new_game(&mut self) -> Vec<GameEvent> {
        self.pending.clear();
        self.state = self.state.next_match();
        self.begin_match();
        self.flush()
    }

    /// Whether `player` could still do anything this turn besides ending it.
    pub fn has_available_action(&self, player: PlayerId) -> bool {
        let state = &self.state;
        if !state.in_progress() || state.is_eliminated(player) {
            return false;
        }
        let can_place = state.round_placements(player) < PLACEMENTS_PER_ROUND
            && Grid::positions().any(|pos| {
                state.grid.is_empty(pos)
                    && (!self.rules.placement_zones || in_placement_zone(player, pos))
            });
        let can_move = state
            .roster(player)
            .iter()
            .any(|id| !state.moved_this_turn.contains(id) && state.last_placed != Some(*id));
        can_place || can_move
    }

    fn dispatch(&mut self, seat: PlayerId, cmd: Command) -> Result<(), CommandError> {
        if !self.state.in_progress() {
            return Err(CommandError::GameOver);
        }
        if !seat.is_valid_for(self.state.players) {
            return Err(CommandError::UnknownSeat);
        }
        if seat != self.state.current_turn {
            return Err(CommandError::NotYourTurn);
        }
        if self.state.is_eliminated(seat) {
            return Err(CommandError::Eliminated);
        }

        match cmd {
            Command::PlaceMonster { row, col } => self.do_place(seat, Pos::new(row, col)),
            Command::MoveMonster {
                from_row,
                from_col,
                to_row,
                to_col,
            } => {
                let from = Pos::new(from_row, from_col);
                let just_placed = self
                    .state
                    .last_placed
                    .and_then(|id| self.state.monster(id))
                    .is_some_and(|m| m.pos == from);
                if just_placed {
                    return Err(CommandError::JustPlaced);
                }
                self.do_move(seat, from, Pos::new(to_row, to_col))
            }
            Command::EndTurn => self.do_end_turn(),
        }
    }

    fn check_actor(&self, player: PlayerId) -> Result<(), CommandError> {
        if !self.state.in_progress() {
            return Err(CommandError::GameOver);
        }
        if !player.is_valid_for(self.state.players) {
            return Err(CommandError::UnknownSeat);
        }
        if self.state.is_eliminated(player) {
            return Err(CommandError::Eliminated);
        }
        Ok(())
    }

    fn do_place(&mut self, player: PlayerId, pos: Pos) -> Result<(), CommandError> {
        self.check_actor(player)?;
        if !pos.in_bounds() {
            return Err(CommandError::OutOfBounds);
        }
        if !self.state.grid.is_empty(pos) {
            return Err(CommandError::CellOccupied);
        }
        if self.state.round_placements(player) >= PLACEMENTS_PER_ROUND {
            return Err(CommandError::QuotaExceeded);
        }
        if self.rules.placement_zones && !in_placement_zone(player, pos) {
            return Err(CommandError::OutsideZone);
        }

        let kind = MonsterKind::ALL[self.rng.pick(MonsterKind::ALL.len())];
        let id = MonsterId(self.state.next_monster_id);
        self.state.next_monster_id += 1;

        let state = &mut self.state;
        state.monsters.insert(
            id,
            Monster {
                id,
                kind,
                owner: player,
                pos,
            },
        );
        state.grid.set(pos, id);
        state.rosters[player.index()].push(id);
        state.round_placements[player.index()] += 1;
        state.has_placed_this_turn = true;
        state.last_placed = Some(id);

        info!(%player, %kind, %pos, "Monster placed");
        self.pending.push(GameEvent::MonsterPlaced {
            id,
            owner: player,
            kind,
            pos,
        });

        self.check_end_of_turn();
        Ok(())
    }

    fn do_move(&mut self, player: PlayerId, from: Pos, to: Pos) -> Result<(), CommandError> {
        self.check_actor(player)?;
        if !from.in_bounds() || !to.in_bounds() {
            return Err(CommandError::OutOfBounds);
        }
        if !is_valid_move(from, to) {
            return Err(CommandError::IllegalMove);
        }
        let mover = self
            .state
            .monster_at(from)
            .cloned()
            .ok_or(CommandError::NoMonster)?;
        if mover.owner != player {
            return Err(CommandError::NotOwner);
        }
        if self.state.moved_this_turn.contains(&mover.id) {
            return Err(CommandError::AlreadyMoved);
        }
        let defender = self.state.monster_at(to).cloned();
        if defender.as_ref().is_some_and(|d| d.owner == player) {
            return Err(CommandError::FriendlyFire);
        }

        match defender {
            None => self.relocate(mover.id, from, to),
            Some(defender) => {
                let outcome = resolve_clash(mover.kind, defender.kind);
                info!(
                    attacker = %mover.owner,
                    attacker_kind = %mover.kind,
                    defender = %defender.owner,
                    defender_kind = %defender.kind,
                    ?outcome,
                    "Combat"
                );
                self.pending.push(GameEvent::Combat {
                    attacker: mover.id,
                    defender: defender.id,
                    outcome,
                });
                match outcome {
                    Clash::AttackerWins => {
                        self.remove_monster(defender.id);
                        self.relocate(mover.id, from, to);
                    }
                    Clash::DefenderWins => self.remove_monster(mover.id),
                    Clash::MutualDestruction => {
                        self.remove_monster(mover.id);
                        self.remove_monster(defender.id);
                    }
                }
            }
        }

        self.state.moved_this_turn.insert(mover.id);
        self.check_end_of_turn();
        Ok(())
    }

    fn do_end_turn(&mut self) -> Result<(), CommandError> {
        if !self.state.in_progress() {
            return Err(CommandError::GameOver);
        }
        self.advance_turn();
        Ok(())
    }

    fn relocate(&mut self, id: MonsterId, from: Pos, to: Pos) {
        let state = &mut self.state;
        state.grid.clear(from);
        state.grid.set(to, id);
        if let Some(m) = state.monsters.get_mut(&id) {
            m.pos = to;
        }
        self.pending.push(GameEvent::MonsterMoved { id, from, to });
    }

    fn remove_monster(&mut self, id: MonsterId) {
        let Some(monster) = self.state.monsters.remove(&id) else {
            return;
        };
        let owner = monster.owner;
        self.state.grid.clear(monster.pos);
        self.state.rosters[owner.index()].retain(|m| *m != id);
        self.state.eliminations[owner.index()] += 1;
        self.pending.push(GameEvent::MonsterRemoved {
            id,
            owner,
            pos: monster.pos,
        });

        let losses = self.state.eliminations[owner.index()];
        if let Some(limit) = self.rules.elimination_limit {
            if losses >= limit && !self.state.is_eliminated(owner) {
                self.eliminate_player(owner);
            }
        }
    }

    fn eliminate_player(&mut self, player: PlayerId) {
        self.state.eliminated[player.index()] = true;
        info!(%player, "Player eliminated");
        self.pending.push(GameEvent::PlayerEliminated { player });
    }

    /// Runs after every placement and move.
    fn check_end_of_turn(&mut self) {
        match self.state.phase {
            Phase::Over => {}
            Phase::Placing => {
                if let Some(winner) = self.last_standing() {
                    self.end_game(winner);
                    return;
                }
                if self.round_complete() {
                    self.state.phase = Phase::Active;
                    self.finish_round();
                }
                self.advance_turn();
            }
            Phase::Active => {
                let empty: Vec<PlayerId> = self
                    .state
                    .active_players()
                    .filter(|p| self.state.roster_len(*p) == 0)
                    .collect();
                for player in empty {
                    self.eliminate_player(player);
                }
                if let Some(winner) = self.last_standing() {
                    self.end_game(winner);
                    return;
                }
                if self.round_complete() {
                    // A round boundary always hands over to the new starter.
                    self.finish_round();
                    self.advance_turn();
                    return;
                }
                let current = self.state.current_turn;
                if self.state.has_placed_this_turn
                    || self.state.is_eliminated(current)
                    || !self.has_available_action(current)
                {
                    self.advance_turn();
                }
            }
        }
    }

    /// `Some(Some(p))` when only `p` is left, `Some(None)` when nobody is.
    fn last_standing(&self) -> Option<Option<PlayerId>> {
        let mut active = self.state.active_players();
        match (active.next(), active.next()) {
            (Some(p), None) => Some(Some(p)),
            (None, _) => Some(None),
            _ => None,
        }
    }

    fn round_complete(&self) -> bool {
        self.state
            .active_players()
            .all(|p| self.state.round_placements(p) >= PLACEMENTS_PER_ROUND)
    }

    fn finish_round(&mut self) {
        self.state.round_placements.iter_mut().for_each(|c| *c = 0);
        self.reorder();
        // Park the cursor on the last seat so the next advance lands on the new starter.
        self.state.turn_index = self.state.turn_order.len().saturating_sub(1);
        debug!(order = ?self.state.turn_order, "Round complete");
        self.pending.push(GameEvent::RoundCompleted {
            next_order: self.state.turn_order.clone(),
        });
    }

    /// Fewest monsters on the board starts; ties broken at random; the rest
    /// keep their order.
    fn reorder(&mut self) {
        let active: Vec<PlayerId> = self
            .state
            .turn_order
            .iter()
            .copied()
            .filter(|p| !self.state.is_eliminated(*p))
            .collect();
        let Some(fewest) = active.iter().map(|p| self.state.roster_len(*p)).min() else {
            return;
        };
        let candidates: Vec<PlayerId> = active
            .iter()
            .copied()
            .filter(|p| self.state.roster_len(*p) == fewest)
            .collect();
        let starter = candidates[self.rng.pick(candidates.len())];

        let mut order = Vec::with_capacity(active.len());
        order.push(starter);
        order.extend(active.into_iter().filter(|p| *p != starter));
        self.state.turn_order = order;
    }

    fn advance_turn(&mut self) {
        let state = &mut self.state;
        state.has_placed_this_turn = false;
        state.last_placed = None;
        state.moved_this_turn.clear();
        state.turns_taken += 1;

        let len = state.turn_order.len();
        if len == 0 {
            return;
        }
        let mut attempts = 0;
        loop {
            state.turn_index = (state.turn_index + 1) % len;
            attempts += 1;
            let seat = state.turn_order[state.turn_index];
            if !state.is_eliminated(seat) || attempts >= self.rules.max_turn_advance {
                state.current_turn = seat;
                break;
            }
        }
        let player = state.current_turn;
        debug!(%player, turn = state.turns_taken, "Turn started");
        self.pending.push(GameEvent::TurnStarted { player });
    }

    fn end_game(&mut self, winner: Option<PlayerId>) {
        let state = &mut self.state;
        state.phase = Phase::Over;
        state.winner = winner;
        state.game_count += 1;
        if let Some(w) = winner {
            state.wins[w.index()] += 1;
            info!(winner = %w, game = state.game_count, "Game over");
        } else {
            info!(game = state.game_count, "Game over, no survivors");
        }
        self.pending.push(GameEvent::GameOver {
            winner,
            game: state.game_count,
        });
    }

    fn begin_match(&mut self) {
        self.reorder();
        let state = &mut self.state;
        state.turn_index = 0;
        state.current_turn = state.turn_order[0];
        let first = state.current_turn;
        info!(game = state.game_count + 1, %first, order = ?state.turn_order, "Match started");
        self.pending.push(GameEvent::GameStarted {
            game: self.state.game_count + 1,
            first,
        });
        self.pending.push(GameEvent::TurnStarted { player: first });
    }

    fn commit(&mut self, result: Result<(), CommandError>) -> Result<Vec<GameEvent>, CommandError> {
        match result {
            Ok(()) => Ok(self.flush()),
            Err(e) => {
                self.pending.clear();
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> Vec<GameEvent> {
        let events = std::mem::take(&mut self.pending);
        for observer in self.observers.iter_mut() {
            observer.on_update(&self.state, &events);
        }
        events
    }
}
