//! Session state (component B): wraps one CRDT document, tracks
//! participants and fencing tokens, and exposes the high-level file
//! operations the hub and tests drive directly.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod config;
mod session;
mod snapshot_store;

pub use config::SessionConfig;
pub use session::{Session, SessionStats, StructuralResult};
pub use snapshot_store::SnapshotStore;

// Re-exported so downstream crates don't need a direct `collabfs-crdt`
// dependency just to name `Origin` when calling `Session::apply_update`.
pub use collabfs_crdt::Origin;


// vim: ts=4
