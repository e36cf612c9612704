//! Shared helpers for the socket integration tests.

use std::{net::SocketAddr, time::Duration};

use grid_client::{client::ClientState, GameClient};
use grid_server::server::bind_ephemeral;
use grid_shared::{
    config::GameConfig,
    grid::{Pos, BOARD_SIZE},
    player::PlayerId,
    state::MatchSnapshot,
};
use tokio::{task::JoinHandle, time::Instant};

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Starts a server on an ephemeral port and runs it in the background.
pub async fn spawn_server(
    cfg: GameConfig,
) -> anyhow::Result<(SocketAddr, JoinHandle<anyhow::Result<()>>)> {
    let (mut server, cfg) = bind_ephemeral(cfg).await?;
    let addr = cfg.server_addr.parse()?;
    let handle = tokio::spawn(async move { server.run().await });
    Ok((addr, handle))
}

/// Connects `n` clients one after another, so seats follow connection order.
pub async fn connect_seats(addr: SocketAddr, n: usize) -> anyhow::Result<Vec<GameClient>> {
    let mut clients = Vec::with_capacity(n);
    for _ in 0..n {
        clients.push(GameClient::connect(addr).await?);
    }
    Ok(clients)
}

/// Reads messages until the newest snapshot satisfies `pred`.
pub async fn wait_for_state(
    client: &mut GameClient,
    mut pred: impl FnMut(&MatchSnapshot) -> bool,
) -> anyhow::Result<MatchSnapshot> {
    let deadline = Instant::now() + WAIT;
    loop {
        if let Some(state) = client.last_state.as_ref().filter(|s| pred(*s)) {
            return Ok(state.clone());
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            anyhow::bail!("{} timed out waiting for state", client.seat);
        }
        client.poll(left).await;
        if client.state == ClientState::Disconnected {
            anyhow::bail!("{} lost its connection", client.seat);
        }
    }
}

/// Reads messages until the server has sent `count` errors in total.
pub async fn wait_for_errors(client: &mut GameClient, count: usize) -> anyhow::Result<String> {
    let deadline = Instant::now() + WAIT;
    while client.errors.len() < count {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            anyhow::bail!("{} timed out waiting for an error", client.seat);
        }
        client.poll(left).await;
    }
    Ok(client.errors[count - 1].clone())
}

/// The `i`-th cell of a seat's placement edge.
pub fn edge_cell(seat: PlayerId, i: usize) -> Pos {
    let i = i % BOARD_SIZE;
    match seat.seat() {
        1 => Pos::new(i, 0),
        2 => Pos::new(i, BOARD_SIZE - 1),
        3 => Pos::new(0, i),
        _ => Pos::new(BOARD_SIZE - 1, i),
    }
}
