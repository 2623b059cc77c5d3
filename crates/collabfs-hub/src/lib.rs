//! The hub (component D): accepts bidirectional byte-stream connections,
//! registers them against sessions, relays sync/awareness frames to peers,
//! handles join/leave/heartbeat/activity custom frames, persists snapshots,
//! and performs graceful shutdown.
//!
//! The connection-lifecycle state machine in [`connection`] is written
//! against the [`transport::Transport`] trait rather than directly against
//! `axum::extract::ws`, so it is unit-testable with an in-memory pair
//! ([`transport::testing`]); [`axum_ws`] supplies the production adapter.
//! Constructing the surrounding `axum::Router`/HTTP listener is out of
//! scope — this crate stops at "given a `Transport`, run the per-connection
//! loop."

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod axum_ws;
mod config;
mod connection;
mod hub;
pub mod transport;

pub use config::HubConfig;
pub use connection::run_connection;
pub use hub::Hub;

// vim: ts=4
