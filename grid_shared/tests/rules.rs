//! Match scenarios driven through the public engine API.

use std::sync::{Arc, Mutex};

use grid_shared::prelude::*;

const P1: PlayerId = PlayerId::new(1);
const P2: PlayerId = PlayerId::new(2);
const P3: PlayerId = PlayerId::new(3);
const P4: PlayerId = PlayerId::new(4);

// Kind picks, as indices into `MonsterKind::ALL`.
const VAMPIRE: usize = 0;
const WEREWOLF: usize = 1;
const GHOST: usize = 2;

fn open(rules: RuleSet) -> RuleSet {
    RuleSet {
        placement_zones: false,
        ..rules
    }
}

fn engine(rules: RuleSet, picks: impl IntoIterator<Item = usize>) -> Engine {
    Engine::new(rules, SequenceRng::new(picks))
}

fn place(engine: &mut Engine, seat: PlayerId, row: usize, col: usize) -> Vec<GameEvent> {
    engine
        .apply(seat, Command::place(Pos::new(row, col)))
        .unwrap_or_else(|e| panic!("{seat} place ({row},{col}): {e}"))
}

fn step(
    engine: &mut Engine,
    seat: PlayerId,
    from: (usize, usize),
    to: (usize, usize),
) -> Result<Vec<GameEvent>, CommandError> {
    engine.apply(
        seat,
        Command::move_monster(Pos::new(from.0, from.1), Pos::new(to.0, to.1)),
    )
}

/// Round one done on an open duel board: player1 Werewolf at (2,2),
/// player2 Ghost at (2,3), then a second round of Vampires far away.
fn werewolf_next_to_ghost() -> Engine {
    let mut engine = engine(
        open(RuleSet::duel()),
        [0, WEREWOLF, GHOST, 0, VAMPIRE, VAMPIRE, 0],
    );
    place(&mut engine, P1, 2, 2);
    place(&mut engine, P2, 2, 3);
    place(&mut engine, P1, 5, 5);
    place(&mut engine, P2, 7, 7);
    assert_eq!(engine.state().current_turn(), P1);
    engine
}

#[test]
fn duel_edge_placements_hand_over_and_close_the_round() {
    let mut engine = engine(RuleSet::duel(), [0, VAMPIRE, VAMPIRE, 1]);
    assert_eq!(engine.state().current_turn(), P1);
    assert_eq!(engine.state().phase(), Phase::Placing);

    place(&mut engine, P1, 3, 0);
    let state = engine.state();
    assert_eq!(state.current_turn(), P2);
    assert_eq!(state.phase(), Phase::Placing);
    assert_eq!(state.round_placements(P1), 1);

    let events = place(&mut engine, P2, 3, 9);
    let state = engine.state();
    assert_eq!(state.phase(), Phase::Active);
    assert_eq!(state.round_placements(P1), 0);
    assert_eq!(state.round_placements(P2), 0);
    assert_eq!(state.turn_order(), &[P2, P1]);
    assert_eq!(state.current_turn(), P2);
    assert!(events.contains(&GameEvent::RoundCompleted {
        next_order: vec![P2, P1]
    }));
    assert_eq!(events.last(), Some(&GameEvent::TurnStarted { player: P2 }));
}

#[test]
fn werewolf_takes_the_ghost() {
    let mut engine = werewolf_next_to_ghost();
    let events = step(&mut engine, P1, (2, 2), (2, 3)).unwrap();

    let state = engine.state();
    let winner = state.monster_at(Pos::new(2, 3)).unwrap();
    assert_eq!(winner.kind, MonsterKind::Werewolf);
    assert_eq!(winner.owner, P1);
    assert!(state.monster_at(Pos::new(2, 2)).is_none());
    assert_eq!(state.roster_len(P2), 1);
    assert_eq!(state.eliminations(P2), 1);
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::Combat { outcome: Clash::AttackerWins, .. })));

    // Nothing placed yet this round, so the turn stays.
    assert_eq!(state.current_turn(), P1);
    assert!(state.in_progress());
    state.check_invariants().unwrap();
}

#[test]
fn three_rows_is_too_far() {
    let mut engine = werewolf_next_to_ghost();
    let before = engine.state().snapshot();

    assert_eq!(
        step(&mut engine, P1, (2, 2), (5, 2)),
        Err(CommandError::IllegalMove)
    );
    // Knight jumps are neither straight nor diagonal.
    assert_eq!(
        step(&mut engine, P1, (2, 2), (3, 4)),
        Err(CommandError::IllegalMove)
    );
    assert_eq!(engine.state().snapshot(), before);
}

#[test]
fn moves_need_an_own_fresh_monster() {
    let mut engine = werewolf_next_to_ghost();
    assert_eq!(
        step(&mut engine, P1, (4, 4), (4, 5)),
        Err(CommandError::NoMonster)
    );
    assert_eq!(
        step(&mut engine, P1, (7, 7), (7, 8)),
        Err(CommandError::NotOwner)
    );

    step(&mut engine, P1, (5, 5), (6, 6)).unwrap();
    assert_eq!(
        step(&mut engine, P1, (6, 6), (6, 7)),
        Err(CommandError::AlreadyMoved)
    );
}

#[test]
fn same_kind_clash_destroys_both() {
    let mut engine = werewolf_next_to_ghost();
    // Both Vampires from round two meet.
    step(&mut engine, P1, (5, 5), (6, 6)).unwrap();
    engine.end_turn().unwrap();
    assert_eq!(engine.state().current_turn(), P2);
    let events = step(&mut engine, P2, (7, 7), (6, 6)).unwrap();

    let state = engine.state();
    assert!(state.monster_at(Pos::new(6, 6)).is_none());
    assert!(state.monster_at(Pos::new(7, 7)).is_none());
    assert_eq!(state.eliminations(P1), 1);
    assert_eq!(state.eliminations(P2), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::Combat {
            outcome: Clash::MutualDestruction,
            ..
        }
    )));
}

#[test]
fn nobody_left_is_a_draw() {
    let mut engine = engine(open(RuleSet::duel()), [0, VAMPIRE, VAMPIRE, 0]);
    place(&mut engine, P1, 0, 0);
    place(&mut engine, P2, 0, 1);
    let events = step(&mut engine, P1, (0, 0), (0, 1)).unwrap();

    let state = engine.state();
    assert_eq!(state.phase(), Phase::Over);
    assert_eq!(state.winner(), None);
    assert_eq!(state.game_count(), 1);
    assert_eq!(state.wins(P1), 0);
    assert_eq!(state.wins(P2), 0);
    assert_eq!(
        events.last(),
        Some(&GameEvent::GameOver {
            winner: None,
            game: 1
        })
    );
}

#[test]
fn one_placement_per_round() {
    let mut engine = engine(open(RuleSet::duel()), [0, VAMPIRE, VAMPIRE, 0]);
    place(&mut engine, P1, 0, 0);
    place(&mut engine, P2, 9, 9);

    place(&mut engine, P1, 1, 1);
    assert_eq!(engine.state().current_turn(), P2);
    engine.apply(P2, Command::EndTurn).unwrap();
    assert_eq!(engine.state().current_turn(), P1);
    assert_eq!(
        engine.apply(P1, Command::place(Pos::new(2, 2))),
        Err(CommandError::QuotaExceeded)
    );
    assert_eq!(engine.state().roster_len(P1), 2);
}

#[test]
fn losing_the_last_monster_eliminates_a_melee_seat() {
    let mut engine = engine(
        open(RuleSet::melee()),
        [0, VAMPIRE, VAMPIRE, WEREWOLF, VAMPIRE, 0],
    );
    let log = Arc::new(Mutex::new(EventLog::new()));
    engine.subscribe(log.clone());

    place(&mut engine, P1, 0, 0);
    place(&mut engine, P2, 5, 5);
    place(&mut engine, P3, 5, 6);
    place(&mut engine, P4, 9, 9);
    assert_eq!(engine.state().phase(), Phase::Active);
    assert_eq!(engine.state().turn_order(), &[P1, P2, P3, P4]);

    place(&mut engine, P1, 0, 1);
    assert_eq!(engine.state().current_turn(), P2);

    // Vampire beats Werewolf: player3 has nothing left.
    let events = step(&mut engine, P2, (5, 5), (5, 6)).unwrap();
    assert!(events.contains(&GameEvent::PlayerEliminated { player: P3 }));
    assert!(engine.state().is_eliminated(P3));
    assert!(engine.state().in_progress());
    assert_eq!(engine.state().current_turn(), P2);

    // Player3 is skipped from here on.
    place(&mut engine, P2, 4, 4);
    assert_eq!(engine.state().current_turn(), P4);
    assert!(engine.apply(P3, Command::EndTurn).is_err());

    place(&mut engine, P4, 8, 8);
    let order = engine.state().turn_order().to_vec();
    assert_eq!(order.len(), 3);
    assert!(!order.contains(&P3));
    assert_eq!(engine.state().current_turn(), order[0]);

    let log = log.lock().unwrap();
    assert!(log
        .events()
        .contains(&GameEvent::PlayerEliminated { player: P3 }));
}

#[test]
fn eliminated_seat_cannot_act() {
    // Direct engine calls skip turn authority but still refuse eliminated seats.
    let mut engine = engine(open(RuleSet::melee()), [0, 0, 0, WEREWOLF, 0, 0]);
    place(&mut engine, P1, 0, 0);
    place(&mut engine, P2, 5, 5);
    place(&mut engine, P3, 5, 6);
    place(&mut engine, P4, 9, 9);
    place(&mut engine, P1, 0, 1);
    step(&mut engine, P2, (5, 5), (5, 6)).unwrap();

    let result = engine.place(P3, Pos::new(3, 3));
    assert_eq!(result, Err(CommandError::Eliminated));
}

/// Player2 feeds Werewolves next to player1's Vampire, one per round.
fn duel_until_tally_limit() -> (Engine, Vec<Vec<PlayerId>>) {
    let mut picks = vec![0, VAMPIRE, WEREWOLF, 1];
    for _ in 0..10 {
        picks.extend([WEREWOLF, VAMPIRE, 0]);
    }
    let mut engine = engine(open(RuleSet::duel()), picks);

    place(&mut engine, P1, 0, 0);
    place(&mut engine, P2, 9, 9);
    let mut orders = vec![engine.state().turn_order().to_vec()];

    for round in 1..=10 {
        let (from, to) = if round % 2 == 1 {
            ((0, 0), (1, 0))
        } else {
            ((1, 0), (0, 0))
        };
        assert_eq!(engine.state().current_turn(), P2, "round {round}");
        place(&mut engine, P2, to.0, to.1);
        step(&mut engine, P1, from, to).unwrap();
        if !engine.state().in_progress() {
            break;
        }
        place(&mut engine, P1, 5, round);
        orders.push(engine.state().turn_order().to_vec());
    }
    (engine, orders)
}

#[test]
fn tenth_loss_ends_the_duel() {
    let (engine, _) = duel_until_tally_limit();
    let state = engine.state();
    assert_eq!(state.eliminations(P2), 10);
    assert!(state.is_eliminated(P2));
    assert_eq!(state.phase(), Phase::Over);
    assert_eq!(state.winner(), Some(P1));
    assert_eq!(state.game_count(), 1);
    assert_eq!(state.wins(P1), 1);
    // Player2's last Werewolf is still on the board.
    assert_eq!(state.roster_len(P2), 1);
}

#[test]
fn fewest_monsters_starts_the_round() {
    let (engine, orders) = duel_until_tally_limit();
    // Player2 keeps losing, so it always has fewer monsters and opens.
    for order in &orders[1..] {
        assert_eq!(order, &vec![P2, P1]);
    }
    assert!(engine.state().roster_len(P1) > engine.state().roster_len(P2));
}

#[test]
fn finished_match_refuses_commands_until_restart() {
    let (mut engine, _) = duel_until_tally_limit();
    assert_eq!(engine.apply(P2, Command::EndTurn), Err(CommandError::GameOver));
    assert_eq!(engine.end_turn(), Err(CommandError::GameOver));

    let events = engine.start_new_game();
    let state = engine.state();
    assert!(state.in_progress());
    assert_eq!(state.phase(), Phase::Placing);
    assert_eq!(state.game_count(), 1);
    assert_eq!(state.wins(P1), 1);
    assert_eq!(state.grid().occupied().count(), 0);
    assert_eq!(state.eliminations(P2), 0);
    assert!(!state.is_eliminated(P2));
    assert!(matches!(
        events.first(),
        Some(GameEvent::GameStarted { game: 2, .. })
    ));
}

#[test]
fn available_action_tracks_quota_and_moves() {
    let mut engine = engine(open(RuleSet::duel()), [0, VAMPIRE, VAMPIRE, 0]);
    assert!(engine.has_available_action(P1));
    place(&mut engine, P1, 0, 0);
    place(&mut engine, P2, 9, 9);

    // Round two: player1 may place and may move.
    assert!(engine.has_available_action(P1));
    step(&mut engine, P1, (0, 0), (1, 1)).unwrap();
    assert!(engine.has_available_action(P1));
    place(&mut engine, P1, 0, 0);

    // Player1's quota is spent but its monsters can move again.
    engine.end_turn().unwrap();
    assert_eq!(engine.state().current_turn(), P1);
    assert!(engine.has_available_action(P1));
}
