//! Tunable constants for a session's lifecycle (§5).

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
	/// How often a session's writer task takes a snapshot of its document.
	pub snapshot_interval: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self { snapshot_interval: Duration::from_secs(5 * 60) }
	}
}

// vim: ts=4
