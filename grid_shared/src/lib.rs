//! `grid_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - The rules engine is a plain state machine with no IO.
//! - Randomness and notification are injected through traits.
//! - Clear separation of concerns (rules, board, protocol, config, events).
//! - No `unsafe`.

pub mod config;
pub mod engine;
pub mod event;
pub mod grid;
pub mod monster;
pub mod net;
pub mod player;
pub mod rng;
pub mod seats;
pub mod state;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::engine::*;
    pub use crate::event::*;
    pub use crate::grid::*;
    pub use crate::monster::*;
    pub use crate::net::*;
    pub use crate::player::*;
    pub use crate::rng::*;
    pub use crate::state::*;
}
