//! `grid_server`
//!
//! Server-side systems:
//! - Seat assignment for the first N connections
//! - Authoritative command dispatch through the shared rules engine
//! - Full-state broadcast to every seat
//!
//! Networking model:
//! - TCP only: handshake, commands, errors and snapshots share one
//!   length-prefixed JSON channel per connection.

pub mod server;

pub use server::GameServer;
