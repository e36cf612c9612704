//! Client implementation.
//!
//! The client maintains:
//! - One reliable stream to the server (handshake, commands, snapshots)
//! - The newest match snapshot and any error messages the server sent
//! - A console that turns typed lines into commands

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use grid_shared::{
    config::GameConfig,
    engine::Command,
    grid::Pos,
    net::{NetMsg, ReliableConn, ReliableWriter, PROTOCOL_VERSION},
    player::PlayerId,
    state::MatchSnapshot,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    input::{parse_line, Action, HELP},
    render::{render_board, render_status},
};

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Seated and receiving updates.
    Connected,
    /// The server went away or we left.
    Disconnected,
}

/// High-level game client.
pub struct GameClient {
    /// Seat announced by the server.
    pub seat: PlayerId,
    /// Seats in this match.
    pub players: u8,
    pub state: ClientState,

    writer: ReliableWriter,
    inbox: mpsc::UnboundedReceiver<NetMsg>,

    /// Newest snapshot received.
    pub last_state: Option<MatchSnapshot>,
    /// Errors the server sent back, oldest first.
    pub errors: Vec<String>,
}

impl GameClient {
    /// Connects to a server and performs the handshake.
    ///
    /// Fails with the server's message when every seat is taken.
    pub async fn connect(server_addr: SocketAddr) -> anyhow::Result<Self> {
        info!(server = %server_addr, "Connecting to server");

        let mut reliable = ReliableConn::connect(server_addr).await?;
        reliable
            .send(&NetMsg::Hello {
                protocol: PROTOCOL_VERSION,
            })
            .await?;

        let (seat, players) = match reliable.recv().await.context("await welcome")? {
            NetMsg::Welcome {
                player_number,
                players,
            } => (player_number, players),
            NetMsg::Error { message } => anyhow::bail!("server refused connection: {message}"),
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };
        info!(%seat, players, "Connected to server");

        let (mut reader, writer) = reliable.into_split();
        let (tx, inbox) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(msg) => {
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Server stream closed");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            seat,
            players,
            state: ClientState::Connected,
            writer,
            inbox,
            last_state: None,
            errors: Vec::new(),
        })
    }

    /// Connects to the address named in a config.
    pub async fn connect_with(cfg: &GameConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        Self::connect(addr).await
    }

    pub async fn send_command(&mut self, command: Command) -> anyhow::Result<()> {
        debug!(seat = %self.seat, ?command, "Sending command");
        self.writer.send(&NetMsg::Command { command }).await
    }

    pub async fn place(&mut self, pos: Pos) -> anyhow::Result<()> {
        self.send_command(Command::place(pos)).await
    }

    pub async fn move_monster(&mut self, from: Pos, to: Pos) -> anyhow::Result<()> {
        self.send_command(Command::move_monster(from, to)).await
    }

    pub async fn end_turn(&mut self) -> anyhow::Result<()> {
        self.send_command(Command::EndTurn).await
    }

    /// Tells the server we are leaving.
    pub async fn disconnect(&mut self) -> anyhow::Result<()> {
        self.state = ClientState::Disconnected;
        self.writer
            .send(&NetMsg::Disconnect {
                reason: "client quit".to_string(),
            })
            .await
    }

    /// Waits for the next server message. `None` once the server is gone.
    ///
    /// Safe to use as a `tokio::select!` branch.
    pub async fn recv(&mut self) -> Option<NetMsg> {
        let msg = self.inbox.recv().await;
        match &msg {
            Some(msg) => self.handle_message(msg),
            None => {
                if self.state == ClientState::Connected {
                    warn!("Lost connection to server");
                }
                self.state = ClientState::Disconnected;
            }
        }
        msg
    }

    /// Like [`GameClient::recv`] but gives up after `timeout`.
    pub async fn poll(&mut self, timeout: Duration) -> Option<NetMsg> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }

    fn handle_message(&mut self, msg: &NetMsg) {
        match msg {
            NetMsg::GameState { state } => {
                self.last_state = Some(state.clone());
            }
            NetMsg::Error { message } => {
                info!(message = %message, "Server error");
                self.errors.push(message.clone());
            }
            NetMsg::Disconnect { reason } => {
                info!(reason = %reason, "Disconnected from server");
                self.state = ClientState::Disconnected;
            }
            other => {
                debug!(?other, "Unhandled message");
            }
        }
    }

    pub fn is_my_turn(&self) -> bool {
        self.last_state
            .as_ref()
            .is_some_and(|s| s.in_progress && s.current_turn == self.seat)
    }

    /// Executes a console command.
    pub async fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let action = match parse_line(line) {
            Ok(action) => action,
            Err(e) => return Ok(vec![e.to_string()]),
        };

        match action {
            Action::Play(command) => {
                self.send_command(command).await?;
                Ok(Vec::new())
            }
            Action::Board => Ok(match &self.last_state {
                Some(snap) => render_board(snap).lines().map(str::to_string).collect(),
                None => vec!["No state received yet".to_string()],
            }),
            Action::Status => {
                let mut out = vec![format!("Seat: {} of {}", self.seat, self.players)];
                if let Some(snap) = &self.last_state {
                    out.extend(render_status(snap, Some(self.seat)));
                }
                Ok(out)
            }
            Action::Help => Ok(HELP.iter().map(|l| l.to_string()).collect()),
            Action::Quit => {
                self.disconnect().await?;
                Ok(vec!["Bye".to_string()])
            }
        }
    }
}
