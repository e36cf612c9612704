//! Server implementation.
//!
//! An authoritative dispatch loop over one [`Engine`]. It supports:
//! - Seat assignment in connection order (first N connections play)
//! - Command dispatch with turn authority
//! - Full-state broadcast after every accepted command and lifecycle change,
//!   one snapshot per change, in order
//! - Delayed restart after a match ends
//! - Console commands (status, restart, quit)
//!
//! Concurrency model:
//! - Each accepted socket says `Hello` in its own task; only finished
//!   handshakes reach the dispatch loop.
//! - One reader task per connection forwards decoded frames into a single
//!   mpsc channel.
//! - The dispatch loop owns the engine, the seat table and every writer, so
//!   commands are applied strictly one after another.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::Context;
use grid_shared::{
    config::GameConfig,
    engine::Engine,
    event::{GameEvent, MatchObserver},
    net::{
        encode_frame, ConnId, NetMsg, ReliableConn, ReliableListener, ReliableWriter,
        PROTOCOL_VERSION,
    },
    player::PlayerId,
    rng::GameRng,
    seats::SeatTable,
    state::MatchState,
};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

/// How long a new connection may take to say hello.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Something a connection task reports to the dispatch loop.
#[derive(Debug)]
enum Inbound {
    /// The peer completed its handshake and wants a seat.
    Joined(ReliableConn, SocketAddr),
    Msg(ConnId, NetMsg),
    Closed(ConnId),
}

/// Why the dispatch loop woke up.
enum Wake {
    Accepted(anyhow::Result<(ReliableConn, SocketAddr)>),
    Inbound(Inbound),
    Console(String),
    Restart,
}

/// Observer that turns every engine update into a snapshot broadcast.
struct SnapshotRelay {
    tx: mpsc::UnboundedSender<NetMsg>,
}

impl MatchObserver for SnapshotRelay {
    fn on_update(&mut self, state: &MatchState, events: &[GameEvent]) {
        for event in events {
            debug!(%event, "Game event");
        }
        let _ = self.tx.send(NetMsg::GameState {
            state: state.snapshot(),
        });
    }
}

/// Game server.
pub struct GameServer {
    pub cfg: GameConfig,
    engine: Engine,
    seats: SeatTable<ConnId>,
    writers: HashMap<ConnId, ReliableWriter>,

    tcp: ReliableListener,

    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    /// Snapshots queued by the engine observer, waiting to be broadcast.
    outbound_rx: mpsc::UnboundedReceiver<NetMsg>,
    /// Direct answers (mostly errors) for single connections.
    replies: Vec<(ConnId, NetMsg)>,

    /// When the finished match is replaced by a fresh one.
    restart_at: Option<Instant>,
    shutdown: bool,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl GameServer {
    /// Binds the listener and sets up the first match.
    pub async fn new(cfg: GameConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let tcp = ReliableListener::bind(addr).await?;
        let mut cfg = cfg;
        cfg.server_addr = tcp.local_addr()?.to_string();
        Ok(Self::with_listener(cfg, tcp))
    }

    fn with_listener(cfg: GameConfig, tcp: ReliableListener) -> Self {
        let rng = match cfg.seed {
            Some(seed) => GameRng::new(seed),
            None => GameRng::from_entropy(),
        };
        info!(seed = rng.seed(), players = cfg.rules.players, "Rules engine ready");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let mut engine = Engine::new(cfg.rules.clone(), rng);
        engine.subscribe(SnapshotRelay { tx: outbound_tx });

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            seats: SeatTable::new(cfg.rules.players),
            cfg,
            engine,
            writers: HashMap::new(),
            tcp,
            inbound_tx,
            inbound_rx,
            outbound_rx,
            replies: Vec::new(),
            restart_at: None,
            shutdown: false,
            console_rx: None,
        }
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Number of seated connections.
    pub fn seated(&self) -> usize {
        self.seats.occupied()
    }

    /// Runs the dispatch loop until `quit` is entered on the console.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!(addr = %self.cfg.server_addr, "Server running");
        while !self.shutdown {
            let wake = tokio::select! {
                accepted = self.tcp.accept() => Wake::Accepted(accepted),
                Some(inbound) = self.inbound_rx.recv() => Wake::Inbound(inbound),
                Some(line) = next_console_line(&mut self.console_rx) => Wake::Console(line),
                _ = restart_timer(self.restart_at) => Wake::Restart,
            };

            match wake {
                Wake::Accepted(Ok((conn, peer))) => self.spawn_handshake(conn, peer),
                Wake::Accepted(Err(e)) => warn!(error = %e, "Accept failed"),
                Wake::Inbound(inbound) => self.handle_inbound(inbound),
                Wake::Console(line) => {
                    for out in self.exec_console(&line)? {
                        println!("{out}");
                    }
                }
                Wake::Restart => self.restart_match(),
            }
            self.broadcast().await;
        }
        info!("Server stopped");
        Ok(())
    }

    /// Processes everything already queued without waiting.
    pub async fn step(&mut self) -> anyhow::Result<()> {
        let lines: Vec<String> = if let Some(ref mut rx) = self.console_rx {
            let mut collected = Vec::new();
            while let Ok(line) = rx.try_recv() {
                collected.push(line);
            }
            collected
        } else {
            Vec::new()
        };
        for line in lines {
            self.exec_console(&line)?;
        }

        while let Ok(inbound) = self.inbound_rx.try_recv() {
            self.handle_inbound(inbound);
        }
        if self.restart_at.is_some_and(|at| at <= Instant::now()) {
            self.restart_match();
        }
        self.broadcast().await;
        Ok(())
    }

    /// Accepts exactly one connection, runs its handshake inline and seats it.
    pub async fn accept_one(&mut self) -> anyhow::Result<Option<PlayerId>> {
        let (mut conn, peer) = self.tcp.accept().await?;
        handshake(&mut conn).await?;
        let seat = self.seat_connection(conn, peer);
        self.broadcast().await;
        Ok(seat)
    }

    /// Runs the handshake off the dispatch loop so a silent peer cannot stall it.
    fn spawn_handshake(&self, mut conn: ReliableConn, peer: SocketAddr) {
        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            match handshake(&mut conn).await {
                Ok(()) => {
                    let _ = tx.send(Inbound::Joined(conn, peer));
                }
                Err(e) => warn!(%peer, error = %e, "Handshake failed"),
            }
        });
    }

    /// Gives a greeted connection a seat: `Welcome` plus the current state are
    /// queued for it, or `Error("game is full")` is sent and it is dropped.
    fn seat_connection(&mut self, mut conn: ReliableConn, peer: SocketAddr) -> Option<PlayerId> {
        let id = ConnId::new_unique();
        let seat = match self.seats.join(id) {
            Ok(seat) => seat,
            Err(e) => {
                info!(%peer, "Connection refused, {e}");
                let refusal = NetMsg::error(e);
                tokio::spawn(async move {
                    if let Err(e) = conn.send(&refusal).await {
                        debug!(%peer, error = %e, "Refusal send failed");
                    }
                });
                return None;
            }
        };

        let (mut reader, writer) = conn.into_split();
        self.writers.insert(id, writer);
        let welcome = NetMsg::Welcome {
            player_number: seat,
            players: self.cfg.rules.players,
        };
        let state = NetMsg::GameState {
            state: self.engine.state().snapshot(),
        };
        self.reply(id, welcome);
        self.reply(id, state);

        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(msg) => {
                        if tx.send(Inbound::Msg(id, msg)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(conn = ?id, error = %e, "Connection reader stopped");
                        let _ = tx.send(Inbound::Closed(id));
                        break;
                    }
                }
            }
        });

        info!(%seat, %peer, conn = ?id, "Player connected");
        Some(seat)
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Joined(conn, peer) => {
                self.seat_connection(conn, peer);
            }
            Inbound::Msg(id, NetMsg::Command { command }) => {
                let Some(seat) = self.seats.seat_of(id) else {
                    debug!(conn = ?id, "Command from unseated connection");
                    return;
                };
                match self.engine.apply(seat, command) {
                    Ok(events) => {
                        if events.iter().any(|e| matches!(e, GameEvent::GameOver { .. })) {
                            self.schedule_restart();
                        }
                    }
                    Err(e) => self.reply(id, NetMsg::error(e)),
                }
            }
            Inbound::Msg(id, NetMsg::Disconnect { reason }) => {
                debug!(conn = ?id, %reason, "Client said goodbye");
                self.drop_conn(id);
            }
            Inbound::Msg(id, other) => {
                debug!(conn = ?id, ?other, "Unexpected message");
            }
            Inbound::Closed(id) => self.drop_conn(id),
        }
    }

    fn schedule_restart(&mut self) {
        let delay = self.cfg.restart_delay();
        info!(delay_ms = delay.as_millis() as u64, "Match finished, restart scheduled");
        self.restart_at = Some(Instant::now() + delay);
    }

    fn restart_match(&mut self) {
        self.restart_at = None;
        self.engine.start_new_game();
        info!(game = self.engine.state().game_count() + 1, "New match");
    }

    fn drop_conn(&mut self, id: ConnId) {
        self.writers.remove(&id);
        if let Ok(seat) = self.seats.leave(id) {
            info!(%seat, conn = ?id, "Player disconnected, seat released");
        }
    }

    /// Queues a message for a single connection, ahead of any broadcast.
    fn reply(&mut self, id: ConnId, msg: NetMsg) {
        self.replies.push((id, msg));
    }

    /// Sends queued replies, then every queued snapshot, oldest first, to
    /// every seated connection.
    async fn broadcast(&mut self) {
        let mut broken = Vec::new();
        for (id, msg) in std::mem::take(&mut self.replies) {
            let Some(writer) = self.writers.get_mut(&id) else {
                continue;
            };
            if let Err(e) = writer.send(&msg).await {
                debug!(conn = ?id, error = %e, "Reply send failed");
                broken.push(id);
            }
        }

        while let Ok(msg) = self.outbound_rx.try_recv() {
            let frame = match encode_frame(&msg) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Failed to encode snapshot");
                    continue;
                }
            };
            for (id, writer) in self.writers.iter_mut() {
                if broken.contains(id) {
                    continue;
                }
                if let Err(e) = writer.send_frame(&frame).await {
                    debug!(conn = ?id, error = %e, "Snapshot send failed");
                    broken.push(*id);
                }
            }
        }
        for id in broken {
            self.drop_conn(id);
        }
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(cmd) = tokens.first() else {
            return Ok(Vec::new());
        };

        match *cmd {
            "status" => {
                let state = self.engine.state();
                let mut out = Vec::new();
                out.push(format!(
                    "Game {} phase={:?} turn={} order={:?}",
                    state.game_count() + u32::from(state.in_progress()),
                    state.phase(),
                    state.current_turn(),
                    state.turn_order()
                ));
                if let Some(at) = self.restart_at {
                    out.push(format!(
                        "Restart in {} ms",
                        at.saturating_duration_since(Instant::now()).as_millis()
                    ));
                }
                out.push(format!(
                    "Seats: {}/{}",
                    self.seats.occupied(),
                    self.seats.capacity()
                ));
                for player in PlayerId::all(state.players()) {
                    let holder = self
                        .seats
                        .holder(player)
                        .map_or_else(|| "empty".to_string(), |c| format!("{c:?}"));
                    out.push(format!(
                        "  {player}: conn={holder} monsters={} lost={} eliminated={} wins={}",
                        state.roster_len(player),
                        state.eliminations(player),
                        state.is_eliminated(player),
                        state.wins(player)
                    ));
                }
                Ok(out)
            }
            "restart" => {
                self.restart_match();
                Ok(vec!["Match restarted".to_string()])
            }
            "quit" | "exit" => {
                info!("Server shutting down");
                self.shutdown = true;
                Ok(vec!["Bye".to_string()])
            }
            "help" => Ok(vec![
                "status   - show match and seats".to_string(),
                "restart  - start a fresh match now".to_string(),
                "quit     - stop the server".to_string(),
            ]),
            other => Ok(vec![format!("Unknown command: {other}")]),
        }
    }
}

/// Reads the peer's `Hello` and checks its protocol version.
async fn handshake(conn: &mut ReliableConn) -> anyhow::Result<()> {
    let hello = tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv())
        .await
        .context("handshake timed out")??;
    match hello {
        NetMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => Ok(()),
        NetMsg::Hello { protocol } => {
            conn.send(&NetMsg::error(format!(
                "protocol {protocol} not supported, expected {PROTOCOL_VERSION}"
            )))
            .await?;
            anyhow::bail!("client speaks protocol {protocol}");
        }
        other => anyhow::bail!("unexpected handshake msg: {other:?}"),
    }
}

async fn next_console_line(rx: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn restart_timer(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral(cfg: GameConfig) -> anyhow::Result<(GameServer, GameConfig)> {
    cfg.validate()?;
    let tcp = ReliableListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).await?;
    let mut cfg = cfg;
    cfg.server_addr = tcp.local_addr()?.to_string();
    Ok((GameServer::with_listener(cfg.clone(), tcp), cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_lists_every_seat() -> anyhow::Result<()> {
        let (mut server, _cfg) = bind_ephemeral(GameConfig {
            seed: Some(3),
            ..Default::default()
        })
        .await?;
        let out = server.exec_console("status")?;
        assert!(out[0].starts_with("Game 1"));
        assert!(out.iter().any(|l| l == "Seats: 0/4"));
        assert_eq!(out.iter().filter(|l| l.contains("conn=empty")).count(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn console_controls_lifecycle() -> anyhow::Result<()> {
        let (mut server, _cfg) = bind_ephemeral(GameConfig::default()).await?;
        assert_eq!(server.exec_console("restart")?, vec!["Match restarted"]);
        assert!(server.engine().state().in_progress());
        assert_eq!(server.exec_console("")?, Vec::<String>::new());
        assert_eq!(server.exec_console("map de_dust")?, vec!["Unknown command: map"]);
        server.exec_console("quit")?;
        // The loop sees the flag before waiting on anything.
        server.run().await?;
        Ok(())
    }
}
