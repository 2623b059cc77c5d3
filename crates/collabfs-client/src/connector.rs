//! How a [`crate::Client`] opens (and, on reconnect, re-opens) its transport.
//! Kept as a trait so the reconnect loop in [`crate::client`] is agnostic to
//! whether the other end is a real hub over a socket or an in-memory pair in
//! a test (§4.D expansion, mirrored from the hub side).

use async_trait::async_trait;
use collabfs_hub::transport::Transport;
use collabfs_types::ClResult;

#[async_trait]
pub trait Connector: Send + Sync {
	type Transport: Transport;

	async fn connect(&self) -> ClResult<Self::Transport>;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
	//! Connects straight into an in-process [`collabfs_hub::Hub`] via the
	//! in-memory channel pair, spawning a fresh `run_connection` task on
	//! every (re)connect attempt — exercising the same reconnect path a real
	//! socket would.

	use super::Connector;
	use async_trait::async_trait;
	use collabfs_hub::transport::testing::{channel_pair, ChannelTransport};
	use collabfs_hub::Hub;
	use collabfs_types::ClResult;
	use std::sync::Arc;

	pub struct HubConnector {
		hub: Arc<Hub>,
	}

	impl HubConnector {
		pub fn new(hub: Arc<Hub>) -> Self {
			Self { hub }
		}
	}

	#[async_trait]
	impl Connector for HubConnector {
		type Transport = ChannelTransport;

		async fn connect(&self) -> ClResult<Self::Transport> {
			let (client_end, hub_end) = channel_pair(32);
			let hub = self.hub.clone();
			tokio::spawn(async move {
				collabfs_hub::run_connection(&hub, hub_end).await;
			});
			Ok(client_end)
		}
	}
}

// vim: ts=4
