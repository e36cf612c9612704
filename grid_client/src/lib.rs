//! `grid_client`
//!
//! Client-side systems:
//! - Connection management and the seat handshake
//! - Console input parsing into player commands
//! - Text rendering of match snapshots
//! - Local hotseat play against the in-process engine

pub mod client;
pub mod input;
pub mod local;
pub mod render;

pub use client::GameClient;
pub use local::LocalGame;
