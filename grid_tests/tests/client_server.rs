//! Full socket-based integration tests for client ↔ server communication.

use std::time::Duration;

use grid_client::GameClient;
use grid_shared::{
    config::{GameConfig, RuleSet},
    grid::Pos,
    net::{decode_from_bytes, encode_to_bytes, NetMsg, PROTOCOL_VERSION},
    player::PlayerId,
    state::Phase,
};
use grid_tests::{
    connect_seats, edge_cell, init_tracing, spawn_server, wait_for_errors, wait_for_state,
};
use tokio::net::TcpStream;

fn melee() -> GameConfig {
    GameConfig {
        seed: Some(11),
        rules: RuleSet::melee(),
        ..Default::default()
    }
}

/// Unit-style test: protocol messages roundtrip correctly.
#[test]
fn protocol_messages_roundtrip() -> anyhow::Result<()> {
    let hello = NetMsg::Hello {
        protocol: PROTOCOL_VERSION,
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&hello)?)?, hello);

    let welcome = NetMsg::Welcome {
        player_number: PlayerId::new(3),
        players: 4,
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&welcome)?)?, welcome);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn seats_follow_connection_order_and_fifth_is_refused() -> anyhow::Result<()> {
    init_tracing();
    let (addr, server) = spawn_server(melee()).await?;

    let clients = connect_seats(addr, 4).await?;
    let seats: Vec<u8> = clients.iter().map(|c| c.seat.seat()).collect();
    assert_eq!(seats, vec![1, 2, 3, 4]);
    assert!(clients.iter().all(|c| c.players == 4));

    let refused = GameClient::connect(addr).await;
    let err = refused.err().expect("fifth connection must be refused");
    assert!(err.to_string().contains("game is full"), "{err}");

    server.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn out_of_turn_command_is_answered_with_an_error() -> anyhow::Result<()> {
    init_tracing();
    let (addr, server) = spawn_server(melee()).await?;
    let mut clients = connect_seats(addr, 4).await?;

    let state = wait_for_state(&mut clients[0], |_| true).await?;
    let current = state.current_turn;
    let idle = clients
        .iter()
        .position(|c| c.seat != current)
        .expect("someone is waiting");

    let seat = clients[idle].seat;
    clients[idle].place(edge_cell(seat, 5)).await?;
    let message = wait_for_errors(&mut clients[idle], 1).await?;
    assert_eq!(message, "not your turn");

    server.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn accepted_placement_reaches_every_seat() -> anyhow::Result<()> {
    init_tracing();
    let (addr, server) = spawn_server(melee()).await?;
    let mut clients = connect_seats(addr, 4).await?;

    let state = wait_for_state(&mut clients[0], |_| true).await?;
    assert_eq!(state.phase, Phase::Placing);
    let current = state.current_turn;
    let cell = edge_cell(current, 5);

    let mover = clients
        .iter_mut()
        .find(|c| c.seat == current)
        .expect("current seat is connected");
    mover.place(cell).await?;

    for client in clients.iter_mut() {
        let seen = wait_for_state(client, |s| s.cell(cell).is_some()).await?;
        let placed = seen.cell(cell).expect("cell filled");
        assert_eq!(placed.owner, current);
        assert_ne!(seen.current_turn, current, "placing hands the turn on");
    }

    server.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn placement_outside_the_edge_is_refused() -> anyhow::Result<()> {
    init_tracing();
    let (addr, server) = spawn_server(melee()).await?;
    let mut clients = connect_seats(addr, 4).await?;

    let state = wait_for_state(&mut clients[0], |_| true).await?;
    let current = state.current_turn;
    let mover = clients
        .iter_mut()
        .find(|c| c.seat == current)
        .expect("current seat is connected");
    mover.place(Pos::new(5, 5)).await?;
    let message = wait_for_errors(mover, 1).await?;
    assert_eq!(message, "you can only place on your own edge");

    server.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn released_seat_goes_to_the_next_connection() -> anyhow::Result<()> {
    init_tracing();
    let (addr, server) = spawn_server(GameConfig {
        rules: RuleSet::duel(),
        ..melee()
    })
    .await?;
    let mut clients = connect_seats(addr, 2).await?;
    let mut leaving = clients.pop().expect("two clients");
    assert_eq!(leaving.seat, PlayerId::new(2));
    leaving.disconnect().await?;
    drop(leaving);

    // The server may see the next connection before the goodbye.
    let mut replacement = None;
    for _ in 0..100 {
        match GameClient::connect(addr).await {
            Ok(client) => {
                replacement = Some(client);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    let replacement = replacement.expect("seat two frees up");
    assert_eq!(replacement.seat, PlayerId::new(2));

    server.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_connection_does_not_hold_up_the_match() -> anyhow::Result<()> {
    init_tracing();
    let (addr, server) = spawn_server(GameConfig {
        rules: RuleSet::duel(),
        ..melee()
    })
    .await?;
    let mut clients = connect_seats(addr, 2).await?;
    let state = wait_for_state(&mut clients[0], |_| true).await?;
    let current = state.current_turn;

    // Connects but never says hello.
    let _silent = TcpStream::connect(addr).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let cell = edge_cell(current, 3);
    let mover = clients
        .iter_mut()
        .find(|c| c.seat == current)
        .expect("current seat is connected");
    mover.place(cell).await?;

    for client in clients.iter_mut() {
        let seen = tokio::time::timeout(
            Duration::from_secs(1),
            wait_for_state(client, |s| s.cell(cell).is_some()),
        )
        .await
        .map_err(|_| anyhow::anyhow!("placement was held up by a silent peer"))??;
        assert_eq!(seen.cell(cell).map(|c| c.owner), Some(current));
    }

    server.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn finished_match_restarts_after_the_delay() -> anyhow::Result<()> {
    init_tracing();
    let (addr, server) = spawn_server(GameConfig {
        seed: Some(5),
        restart_delay_ms: 500,
        rules: RuleSet {
            placement_zones: false,
            ..RuleSet::duel()
        },
        ..Default::default()
    })
    .await?;
    let mut clients = connect_seats(addr, 2).await?;

    // Round one puts the two monsters side by side.
    let cells = [Pos::new(4, 4), Pos::new(4, 5)];
    for cell in cells {
        let state = wait_for_state(&mut clients[0], |s| s.in_progress).await?;
        let current = state.current_turn;
        let placer = clients
            .iter_mut()
            .find(|c| c.seat == current)
            .expect("current seat is connected");
        placer.place(cell).await?;
        for client in clients.iter_mut() {
            wait_for_state(client, |s| s.cell(cell).is_some()).await?;
        }
    }
    for client in clients.iter_mut() {
        wait_for_state(client, |s| s.phase == Phase::Active).await?;
    }

    // Any outcome of the fight leaves at most one seat with monsters.
    let attacker = clients
        .iter_mut()
        .find(|c| c.is_my_turn())
        .expect("someone starts round two");
    let board = attacker.last_state.clone().expect("state received");
    let (from, to) = if board.cell(cells[0]).map(|c| c.owner) == Some(attacker.seat) {
        (cells[0], cells[1])
    } else {
        (cells[1], cells[0])
    };
    attacker.move_monster(from, to).await?;

    let over = wait_for_state(&mut clients[0], |s| !s.in_progress).await?;
    assert_eq!(over.phase, Phase::Over);
    assert_eq!(over.game_count, 1);

    clients[0].end_turn().await?;
    assert_eq!(wait_for_errors(&mut clients[0], 1).await?, "game is over");

    let fresh = wait_for_state(&mut clients[0], |s| s.in_progress).await?;
    assert_eq!(fresh.phase, Phase::Placing);
    assert_eq!(fresh.game_count, 1);
    assert!(cells.iter().all(|c| fresh.cell(*c).is_none()));
    let wins: u32 = fresh.players.iter().map(|p| p.wins).sum();
    assert_eq!(wins, u32::from(over.winner.is_some()));
    if let Some(winner) = over.winner {
        assert_eq!(fresh.player(winner).map(|p| p.wins), Some(1));
    }

    server.abort();
    Ok(())
}
