//! Hub-wide tunables (§5): heartbeat/idle timing and broadcast backpressure.
//! Snapshot cadence itself lives on `collabfs_session::SessionConfig`, which
//! the hub passes through unchanged to every session it spawns.

use std::time::Duration;

use collabfs_session::SessionConfig;

#[derive(Debug, Clone)]
pub struct HubConfig {
	/// Clients are expected to send a `heartbeat` custom frame at this
	/// cadence (§4.E: every 30 seconds).
	pub heartbeat_interval: Duration,
	/// A stream that has sent nothing for this long is closed as if `leave`
	/// had arrived (§5: "3x heartbeat-interval").
	pub idle_timeout: Duration,
	/// Outbound per-peer queue capacity; a peer whose queue is full when a
	/// broadcast is attempted is dropped rather than blocking the sender
	/// (§4.D "Backpressure").
	pub broadcast_high_water_mark: usize,
	/// Config handed to every `Session` the hub spawns.
	pub session: SessionConfig,
}

impl Default for HubConfig {
	fn default() -> Self {
		let heartbeat_interval = Duration::from_secs(30);
		Self {
			heartbeat_interval,
			idle_timeout: heartbeat_interval * 3,
			broadcast_high_water_mark: 64,
			session: SessionConfig::default(),
		}
	}
}

// vim: ts=4
