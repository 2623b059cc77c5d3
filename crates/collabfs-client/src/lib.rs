//! The client replica (component E): a local CRDT document kept in sync with
//! a hub session over a reconnecting transport. Mirrors `collabfs-hub`'s
//! split between the wire-agnostic state machine ([`client`]) and the
//! concrete transport adapters ([`ws_connector`] for production,
//! [`connector::testing`] for in-memory tests).

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod client;
pub mod config;
pub mod connector;
pub mod ws_connector;

pub use client::{Client, ConnectionState, StructuralResult};
pub use config::ClientConfig;
pub use connector::Connector;

// vim: ts=4
