//! Client-side tunables (§4.E / §5): heartbeat cadence and reconnect backoff.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// `custom{heartbeat}` is sent at this cadence while connected (§4.E).
	pub heartbeat_interval: Duration,
	/// First reconnect wait after an unexpected close.
	pub reconnect_base: Duration,
	/// Multiplier applied to the wait after each failed attempt.
	pub reconnect_factor: u32,
	/// After this many consecutive failed attempts, give up and surface
	/// `PermanentDisconnect` (§5 "Reconnect: client bounds retries").
	pub reconnect_max_attempts: u32,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			heartbeat_interval: Duration::from_secs(30),
			reconnect_base: Duration::from_secs(1),
			reconnect_factor: 2,
			reconnect_max_attempts: 10,
		}
	}
}

impl ClientConfig {
	/// Wait before the `attempt`-th reconnect try (0-indexed): `base *
	/// factor^attempt`, uncapped — `reconnect_max_attempts` bounds the
	/// *count* of tries, not the individual wait.
	pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
		self.reconnect_base.saturating_mul(self.reconnect_factor.saturating_pow(attempt))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_each_attempt() {
		let config = ClientConfig::default();
		assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(1));
		assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(2));
		assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(4));
		assert_eq!(config.backoff_for_attempt(3), Duration::from_secs(8));
	}
}

// vim: ts=4
