//! Networking primitives.
//!
//! Goals:
//! - One reliable TCP channel per seat carrying length-prefixed JSON frames.
//! - Commands flow client -> server, full state snapshots flow back.
//! - Keep serialization explicit and versionable.
//!
//! Frame layout: `u32` big-endian payload length, then a JSON-encoded
//! [`NetMsg`].

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    sync::atomic::{AtomicU32, Ordering},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};

use crate::{engine::Command, player::PlayerId, state::MatchSnapshot};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Frames larger than this are treated as a broken peer.
pub const MAX_FRAME_LEN: usize = 1 << 20;

static NEXT_CONN_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies one accepted connection for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnId(pub u32);

impl ConnId {
    pub fn new_unique() -> Self {
        ConnId(NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
    },
    /// Server announces the seat assigned to this connection.
    #[serde(rename_all = "camelCase")]
    Welcome {
        player_number: PlayerId,
        players: u8,
    },

    // ─── Gameplay ───
    /// Client -> server: one player intent.
    Command {
        command: Command,
    },
    /// Server -> clients: full match state.
    GameState {
        state: MatchSnapshot,
    },
    /// Server -> client: a refused command or connection.
    Error {
        message: String,
    },

    // ─── Disconnect ───
    Disconnect {
        reason: String,
    },
}

impl NetMsg {
    pub fn error(message: impl std::fmt::Display) -> Self {
        NetMsg::Error {
            message: message.to_string(),
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, msg: &NetMsg) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(msg).context("serialize msg")?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    w.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> anyhow::Result<NetMsg> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await.context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("frame of {len} bytes exceeds limit");
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
    Ok(msg)
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        Ok(Self::new(stream))
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        write_frame(&mut self.stream, msg).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_frame(&mut self.stream).await
    }

    /// Splits into halves so reads and writes can live in different tasks.
    pub fn into_split(self) -> (ReliableReader, ReliableWriter) {
        let (r, w) = self.stream.into_split();
        (ReliableReader { half: r }, ReliableWriter { half: w })
    }
}

/// Read half of a [`ReliableConn`].
#[derive(Debug)]
pub struct ReliableReader {
    half: OwnedReadHalf,
}

impl ReliableReader {
    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_frame(&mut self.half).await
    }
}

/// Write half of a [`ReliableConn`].
#[derive(Debug)]
pub struct ReliableWriter {
    half: OwnedWriteHalf,
}

impl ReliableWriter {
    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        write_frame(&mut self.half, msg).await
    }

    /// Sends pre-encoded frame bytes (see [`encode_frame`]).
    pub async fn send_frame(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        self.half.write_all(frame).await.context("tcp write")?;
        Ok(())
    }
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

/// Encodes a whole frame once so a broadcast can reuse it for every peer.
pub fn encode_frame(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}
