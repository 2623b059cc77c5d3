//! The hub (component D): a session registry plus, per session, a set of
//! connected peers to fan updates out to. One process, many sessions; each
//! session serializes its own mutations via its `Session` actor (§5), so the
//! registry lock here is only ever held for map bookkeeping, never across
//! I/O.

use std::collections::HashMap;
use std::sync::Arc;

use collabfs_codec::Frame;
use collabfs_session::{Session, SessionConfig, SnapshotStore};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::config::HubConfig;

/// One session's document actor plus the outbound queues of its currently
/// connected peers.
pub(crate) struct HubSession {
	session: Session,
	peers: RwLock<HashMap<String, mpsc::Sender<Frame>>>,
}

/// Central relay for every session this process hosts.
pub struct Hub {
	config: HubConfig,
	snapshot_store: Option<Arc<dyn SnapshotStore>>,
	sessions: RwLock<HashMap<String, Arc<HubSession>>>,
}

impl Hub {
	pub fn new(config: HubConfig, snapshot_store: Option<Arc<dyn SnapshotStore>>) -> Self {
		Self { config, snapshot_store, sessions: RwLock::new(HashMap::new()) }
	}

	pub fn config(&self) -> &HubConfig {
		&self.config
	}

	/// Creates the session lazily if absent, restoring from the snapshot
	/// store when one exists (§4.D step 2a).
	async fn get_or_create_session(&self, session_id: &str) -> Arc<HubSession> {
		if let Some(existing) = self.sessions.read().await.get(session_id) {
			return existing.clone();
		}
		let mut sessions = self.sessions.write().await;
		if let Some(existing) = sessions.get(session_id) {
			return existing.clone();
		}
		info!("hub: creating session {}", session_id);
		let session =
			Session::spawn(session_id, self.session_config(), self.snapshot_store.clone()).await;
		let entry = Arc::new(HubSession { session, peers: RwLock::new(HashMap::new()) });
		sessions.insert(session_id.to_string(), entry.clone());
		entry
	}

	fn session_config(&self) -> SessionConfig {
		self.config.session.clone()
	}

	/// Registers a connection's outbound queue against a session so it
	/// receives fan-out frames; returns the queue's receiving half.
	async fn register_peer(
		&self,
		hub_session: &HubSession,
		conn_id: &str,
	) -> mpsc::Receiver<Frame> {
		let (tx, rx) = mpsc::channel(self.config.broadcast_high_water_mark);
		hub_session.peers.write().await.insert(conn_id.to_string(), tx);
		rx
	}

	async fn deregister_peer(&self, hub_session: &HubSession, conn_id: &str) {
		hub_session.peers.write().await.remove(conn_id);
	}

	/// Sends `frame` to every registered peer of `session_id` except
	/// `exclude`. A peer whose queue is full is dropped (§4.D "Backpressure")
	/// rather than blocking the broadcast.
	async fn broadcast(&self, hub_session: &HubSession, exclude: &str, frame: Frame) {
		let mut dead = Vec::new();
		{
			let peers = hub_session.peers.read().await;
			for (conn_id, tx) in peers.iter() {
				if conn_id == exclude {
					continue;
				}
				if tx.try_send(frame.clone()).is_err() {
					dead.push(conn_id.clone());
				}
			}
		}
		if !dead.is_empty() {
			let mut peers = hub_session.peers.write().await;
			for conn_id in dead {
				warn!("hub: dropping backpressured peer {}", conn_id);
				peers.remove(&conn_id);
			}
		}
	}

	/// Removes a now-empty session after writing its final snapshot (§5
	/// graceful-shutdown contract, also used for S6 idle eviction).
	async fn maybe_destroy_session(&self, session_id: &str) {
		let is_empty = {
			let sessions = self.sessions.read().await;
			match sessions.get(session_id) {
				Some(entry) => entry.peers.read().await.is_empty(),
				None => return,
			}
		};
		if !is_empty {
			return;
		}
		let mut sessions = self.sessions.write().await;
		let Some(entry) = sessions.get(session_id) else { return };
		if !entry.peers.read().await.is_empty() {
			return; // a peer joined between the read lock above and here
		}
		if let Err(err) = entry.session.shutdown().await {
			warn!("hub: final snapshot failed for session {}: {}", session_id, err);
		}
		sessions.remove(session_id);
		debug!("hub: session {} destroyed (no participants left)", session_id);
	}

	/// Stops accepting new work conceptually (callers must stop handing the
	/// hub new connections) and snapshots every live session in parallel
	/// before returning (§5 "Graceful shutdown").
	pub async fn shutdown(&self) {
		let sessions: Vec<Arc<HubSession>> = self.sessions.read().await.values().cloned().collect();
		let snapshots = sessions.iter().map(|entry| entry.session.shutdown());
		for result in futures::future::join_all(snapshots).await {
			if let Err(err) = result {
				warn!("hub: shutdown snapshot failed: {}", err);
			}
		}
		self.sessions.write().await.clear();
	}

	pub async fn session_count(&self) -> usize {
		self.sessions.read().await.len()
	}
}

pub(crate) struct JoinedHandles {
	pub(crate) hub_session: Arc<HubSession>,
	pub(crate) outbound_rx: mpsc::Receiver<Frame>,
}

impl Hub {
	pub(crate) async fn join(&self, session_id: &str, conn_id: &str) -> JoinedHandles {
		let hub_session = self.get_or_create_session(session_id).await;
		let outbound_rx = self.register_peer(&hub_session, conn_id).await;
		JoinedHandles { hub_session, outbound_rx }
	}

	pub(crate) async fn leave(&self, session_id: &str, hub_session: &HubSession, conn_id: &str) {
		self.deregister_peer(hub_session, conn_id).await;
		self.maybe_destroy_session(session_id).await;
	}

	pub(crate) async fn fan_out(&self, hub_session: &HubSession, exclude: &str, frame: Frame) {
		self.broadcast(hub_session, exclude, frame).await;
	}
}

impl HubSession {
	pub(crate) fn session(&self) -> &Session {
		&self.session
	}
}

// vim: ts=4
