//! Shared domain types and error types for collabfs.
//!
//! This crate contains the foundational types shared between the CRDT
//! document, the session, the hub, the client replica, and the snapshot
//! adapter. Extracting these into a separate crate keeps the downstream
//! crates free of cyclic dependencies.

pub mod error;
pub mod model;
pub mod prelude;
pub mod utils;

pub use error::{ClResult, Error};
pub use model::{Activity, ActivityAction, FileMeta, Operation, OperationKind, WriteMode};

// vim: ts=4
