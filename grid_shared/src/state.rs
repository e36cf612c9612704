//! Match state.
//!
//! [`MatchState`] is the single aggregate the engine mutates. It is read by
//! observers and flattened into a [`MatchSnapshot`] for the wire.
//!
//! Invariants:
//! - Every cell holds at most one monster.
//! - A monster's recorded position matches the cell that references it.
//! - Every monster in a roster is owned by that seat and sits on the grid once.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    grid::{Grid, Pos, BOARD_SIZE},
    monster::{Monster, MonsterId, MonsterKind},
    player::PlayerId,
};

/// Where the match is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Round one: every seat places its first monster.
    Placing,
    /// Later rounds: placement, movement and combat.
    Active,
    /// A winner has been declared; commands are refused.
    Over,
}

#[derive(Debug, Clone)]
pub struct MatchState {
    pub(crate) players: u8,
    pub(crate) grid: Grid,
    pub(crate) monsters: BTreeMap<MonsterId, Monster>,
    pub(crate) rosters: Vec<Vec<MonsterId>>,
    pub(crate) eliminations: Vec<u32>,
    pub(crate) eliminated: Vec<bool>,
    pub(crate) round_placements: Vec<u32>,
    pub(crate) turn_order: Vec<PlayerId>,
    pub(crate) turn_index: usize,
    pub(crate) turns_taken: u32,
    pub(crate) current_turn: PlayerId,
    pub(crate) has_placed_this_turn: bool,
    pub(crate) last_placed: Option<MonsterId>,
    pub(crate) moved_this_turn: BTreeSet<MonsterId>,
    pub(crate) phase: Phase,
    pub(crate) winner: Option<PlayerId>,
    pub(crate) next_monster_id: u32,
    pub(crate) game_count: u32,
    pub(crate) wins: Vec<u32>,
}

impl MatchState {
    /// Empty board for `players` seats, turn order in seat order.
    pub fn new(players: u8) -> Self {
        let n = players as usize;
        Self {
            players,
            grid: Grid::new(),
            monsters: BTreeMap::new(),
            rosters: vec![Vec::new(); n],
            eliminations: vec![0; n],
            eliminated: vec![false; n],
            round_placements: vec![0; n],
            turn_order: PlayerId::all(players).collect(),
            turn_index: 0,
            turns_taken: 0,
            current_turn: PlayerId::new(1),
            has_placed_this_turn: false,
            last_placed: None,
            moved_this_turn: BTreeSet::new(),
            phase: Phase::Placing,
            winner: None,
            next_monster_id: 0,
            game_count: 0,
            wins: vec![0; n],
        }
    }

    /// A fresh match that keeps the cross-match counters of `self`.
    pub(crate) fn next_match(&self) -> Self {
        Self {
            game_count: self.game_count,
            wins: self.wins.clone(),
            ..Self::new(self.players)
        }
    }

    pub fn players(&self) -> u8 {
        self.players
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn in_progress(&self) -> bool {
        self.phase != Phase::Over
    }

    pub fn current_turn(&self) -> PlayerId {
        self.current_turn
    }

    pub fn turn_order(&self) -> &[PlayerId] {
        &self.turn_order
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn game_count(&self) -> u32 {
        self.game_count
    }

    pub fn wins(&self, player: PlayerId) -> u32 {
        self.wins.get(player.index()).copied().unwrap_or(0)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn monster(&self, id: MonsterId) -> Option<&Monster> {
        self.monsters.get(&id)
    }

    pub fn monster_at(&self, pos: Pos) -> Option<&Monster> {
        self.grid.get(pos).and_then(|id| self.monsters.get(&id))
    }

    /// Live monsters of a seat, in placement order.
    pub fn roster(&self, player: PlayerId) -> &[MonsterId] {
        self.rosters
            .get(player.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn roster_len(&self, player: PlayerId) -> usize {
        self.roster(player).len()
    }

    /// Monsters this seat has lost in the current match.
    pub fn eliminations(&self, player: PlayerId) -> u32 {
        self.eliminations.get(player.index()).copied().unwrap_or(0)
    }

    pub fn is_eliminated(&self, player: PlayerId) -> bool {
        self.eliminated.get(player.index()).copied().unwrap_or(true)
    }

    pub fn round_placements(&self, player: PlayerId) -> u32 {
        self.round_placements
            .get(player.index())
            .copied()
            .unwrap_or(0)
    }

    /// Seats not yet eliminated, in seat order.
    pub fn active_players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        PlayerId::all(self.players).filter(move |p| !self.is_eliminated(*p))
    }

    /// Verifies the grid/roster invariants, describing the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = BTreeSet::new();
        for (pos, id) in self.grid.occupied() {
            let monster = self
                .monsters
                .get(&id)
                .ok_or_else(|| format!("cell {pos} references unknown monster {id:?}"))?;
            if monster.pos != pos {
                return Err(format!(
                    "monster {id:?} records {} but sits at {pos}",
                    monster.pos
                ));
            }
            if !seen.insert(id) {
                return Err(format!("monster {id:?} appears on more than one cell"));
            }
        }
        if seen.len() != self.monsters.len() {
            return Err(format!(
                "{} monsters live but {} on the grid",
                self.monsters.len(),
                seen.len()
            ));
        }
        let mut rostered = 0;
        for player in PlayerId::all(self.players) {
            for id in self.roster(player) {
                let monster = self
                    .monsters
                    .get(id)
                    .ok_or_else(|| format!("{player} roster holds dead monster {id:?}"))?;
                if monster.owner != player {
                    return Err(format!("{player} roster holds {id:?} owned by {}", monster.owner));
                }
                rostered += 1;
            }
        }
        if rostered != self.monsters.len() {
            return Err(format!(
                "{rostered} rostered monsters but {} live",
                self.monsters.len()
            ));
        }
        Ok(())
    }

    /// Flattens the state for observers on the other side of a wire.
    pub fn snapshot(&self) -> MatchSnapshot {
        let grid = (0..BOARD_SIZE)
            .map(|r| {
                (0..BOARD_SIZE)
                    .map(|c| {
                        self.monster_at(Pos::new(r, c)).map(|m| CellView {
                            id: m.id,
                            kind: m.kind,
                            owner: m.owner,
                        })
                    })
                    .collect()
            })
            .collect();

        let players = PlayerId::all(self.players)
            .map(|p| PlayerView {
                seat: p,
                monsters: self.roster_len(p),
                eliminations: self.eliminations(p),
                eliminated: self.is_eliminated(p),
                placed_this_round: self.round_placements(p),
                wins: self.wins(p),
            })
            .collect();

        MatchSnapshot {
            grid,
            players,
            current_turn: self.current_turn,
            turn_order: self.turn_order.clone(),
            phase: self.phase,
            in_progress: self.in_progress(),
            has_placed_this_turn: self.has_placed_this_turn,
            last_placed: self
                .last_placed
                .and_then(|id| self.monsters.get(&id))
                .map(|m| m.pos),
            winner: self.winner,
            game_count: self.game_count,
        }
    }
}

/// One occupied cell as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellView {
    pub id: MonsterId,
    pub kind: MonsterKind,
    pub owner: PlayerId,
}

/// Per-seat summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub seat: PlayerId,
    pub monsters: usize,
    pub eliminations: u32,
    pub eliminated: bool,
    pub placed_this_round: u32,
    pub wins: u32,
}

/// Full state broadcast after every accepted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Row-major cells, `BOARD_SIZE` x `BOARD_SIZE`.
    pub grid: Vec<Vec<Option<CellView>>>,
    pub players: Vec<PlayerView>,
    pub current_turn: PlayerId,
    pub turn_order: Vec<PlayerId>,
    pub phase: Phase,
    pub in_progress: bool,
    pub has_placed_this_turn: bool,
    pub last_placed: Option<Pos>,
    pub winner: Option<PlayerId>,
    pub game_count: u32,
}

impl MatchSnapshot {
    pub fn cell(&self, pos: Pos) -> Option<&CellView> {
        self.grid
            .get(pos.row)
            .and_then(|row| row.get(pos.col))
            .and_then(Option::as_ref)
    }

    pub fn player(&self, seat: PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.seat == seat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_monster(state: &mut MatchState, owner: PlayerId, pos: Pos) -> MonsterId {
        let id = MonsterId(state.next_monster_id);
        state.next_monster_id += 1;
        state.monsters.insert(
            id,
            Monster {
                id,
                kind: MonsterKind::Ghost,
                owner,
                pos,
            },
        );
        state.grid.set(pos, id);
        state.rosters[owner.index()].push(id);
        id
    }

    #[test]
    fn new_state_is_empty_and_consistent() {
        let state = MatchState::new(4);
        assert_eq!(state.phase(), Phase::Placing);
        assert!(state.in_progress());
        assert_eq!(state.turn_order().len(), 4);
        assert_eq!(state.active_players().count(), 4);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn invariant_check_catches_stale_position() {
        let mut state = MatchState::new(2);
        let id = with_monster(&mut state, PlayerId::new(1), Pos::new(1, 0));
        assert!(state.check_invariants().is_ok());
        state.monsters.get_mut(&id).unwrap().pos = Pos::new(2, 0);
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn invariant_check_catches_foreign_roster_entry() {
        let mut state = MatchState::new(2);
        let id = with_monster(&mut state, PlayerId::new(1), Pos::new(1, 0));
        state.rosters[1].push(id);
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn next_match_keeps_counters_only() {
        let mut state = MatchState::new(2);
        with_monster(&mut state, PlayerId::new(2), Pos::new(4, 9));
        state.game_count = 3;
        state.wins = vec![1, 2];
        state.phase = Phase::Over;

        let fresh = state.next_match();
        assert_eq!(fresh.game_count(), 3);
        assert_eq!(fresh.wins(PlayerId::new(2)), 2);
        assert_eq!(fresh.phase(), Phase::Placing);
        assert_eq!(fresh.roster_len(PlayerId::new(2)), 0);
        assert!(fresh.grid().occupied().next().is_none());
    }

    #[test]
    fn snapshot_reflects_cells_and_players() {
        let mut state = MatchState::new(2);
        let id = with_monster(&mut state, PlayerId::new(1), Pos::new(3, 0));
        state.last_placed = Some(id);

        let snap = state.snapshot();
        assert_eq!(snap.grid.len(), BOARD_SIZE);
        let cell = snap.cell(Pos::new(3, 0)).unwrap();
        assert_eq!(cell.owner, PlayerId::new(1));
        assert_eq!(snap.last_placed, Some(Pos::new(3, 0)));
        assert_eq!(snap.player(PlayerId::new(1)).unwrap().monsters, 1);
        assert_eq!(snap.player(PlayerId::new(2)).unwrap().monsters, 0);

        let json = serde_json::to_string(&snap).unwrap();
        let back: MatchSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
