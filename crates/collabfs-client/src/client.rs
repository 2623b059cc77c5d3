//! The client replica (component E): one CRDT document plus a reconnecting
//! sync session. Runs as a dedicated actor task reached through an `mpsc`
//! command queue, mirroring `collabfs_session::Session`'s actor pattern —
//! the public `Client` handle is a cheap clone of the channel sender, and
//! every public operation is a channel round-trip so document transactions
//! are serialized without a lock (§5: "Clients are single-replica; their
//! public operations are serialized by a per-document lock around each
//! transaction" — here the single actor task plays that role).

use collabfs_codec::control::StructuralAckData;
use collabfs_crdt::{Document, Origin};
use collabfs_hub::transport::{FrameSink, FrameSource, Transport};
use collabfs_codec::{ControlMessage, Frame, SyncStep};
use collabfs_types::model::{Activity, ActivityAction, ActivityPatch, FileMeta, WriteMode};
use collabfs_types::utils::now_ms;
use collabfs_types::{ClResult, Error};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::connector::Connector;

/// Outcome of `move_file`/`delete_file`, mirroring
/// `collabfs_session::StructuralResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralResult {
	pub success: bool,
	pub token: i64,
	pub error: Option<String>,
}

/// Whether the replica currently has a live sync session with the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	Connecting,
	Connected,
	/// Between reconnect attempts, or before the first attempt.
	Disconnected,
	/// `reconnect_max_attempts` was exhausted; the client gave up (§5).
	PermanentlyDisconnected,
}

/// What `run`'s select loop should do after a command finishes.
enum Outcome {
	Continue,
	Reconnect,
	Shutdown,
}

enum Command {
	WriteFile { path: String, content: String, mode: WriteMode, reply: oneshot::Sender<i64> },
	MoveFile { old: String, new: String, reply: oneshot::Sender<StructuralResult> },
	DeleteFile { path: String, reply: oneshot::Sender<StructuralResult> },
	ReadFile { path: String, reply: oneshot::Sender<Option<String>> },
	ListFiles { prefix: String, reply: oneshot::Sender<Vec<(String, FileMeta)>> },
	UpdateActivity { patch: ActivityPatch, reply: oneshot::Sender<Activity> },
	ConnectionState { reply: oneshot::Sender<ConnectionState> },
	Shutdown { reply: oneshot::Sender<()> },
}

struct ClientActor<C: Connector> {
	user_id: String,
	session_id: String,
	document: Document,
	connector: C,
	config: ClientConfig,
	state: ConnectionState,
}

impl<C: Connector> ClientActor<C> {
	/// Sends a `write_file` request and blocks (this actor only — other
	/// connections are unaffected) until the hub's `write_ack` arrives,
	/// applying every other inbound frame along the way via
	/// [`Self::handle_inbound`] so Step2 relays and presence frames are not
	/// missed while waiting (§5 "serialized by a per-document lock").
	async fn await_write_ack<K: FrameSink, R: FrameSource>(
		&mut self,
		sink: &mut K,
		source: &mut R,
		path: String,
		content: String,
		mode: WriteMode,
	) -> ClResult<i64> {
		sink.send(Frame::Custom(ControlMessage::WriteFile {
			user_id: self.user_id.clone(),
			session_id: self.session_id.clone(),
			path,
			content,
			mode,
		}))
		.await?;
		loop {
			let frame = source
				.recv()
				.await?
				.ok_or_else(|| Error::Internal("connection closed while awaiting write ack".into()))?;
			if let Frame::Custom(ControlMessage::WriteAck { data }) = frame {
				return Ok(data.token);
			}
			self.handle_inbound(sink, frame).await;
		}
	}

	/// Same as [`Self::await_write_ack`], for `move_file`/`delete_file`'s
	/// `structural_ack` reply.
	async fn await_structural_ack<K: FrameSink, R: FrameSource>(
		&mut self,
		sink: &mut K,
		source: &mut R,
		request: ControlMessage,
	) -> ClResult<StructuralResult> {
		sink.send(Frame::Custom(request)).await?;
		loop {
			let frame = source.recv().await?.ok_or_else(|| {
				Error::Internal("connection closed while awaiting structural ack".into())
			})?;
			if let Frame::Custom(ControlMessage::StructuralAck {
				data: StructuralAckData { success, token, error, .. },
			}) = frame
			{
				return Ok(StructuralResult { success, token, error });
			}
			self.handle_inbound(sink, frame).await;
		}
	}

	fn handle_update_activity(&mut self, patch: ActivityPatch) -> Activity {
		let now = now_ms();
		let user_id = self.user_id.clone();
		self.document.transact(Origin::Local, |txn, doc| {
			let mut activity = doc.activity_for_in(txn, &user_id).unwrap_or(Activity {
				user_id: user_id.clone(),
				current_file: None,
				action: ActivityAction::Idle,
				timestamp_ms: now,
			});
			if let Some(current_file) = patch.current_file {
				activity.current_file = current_file;
			}
			if let Some(action) = patch.action {
				activity.action = action;
			}
			activity.timestamp_ms = now;
			doc.set_activity(txn, &activity);
			activity
		})
	}

	/// Dispatches one command while connected. Structural/write commands are
	/// a blocking request/ack round trip over the wire (§4.B: the hub is the
	/// single writer, so a client never decides `success`/`token` itself —
	/// see [`Self::await_write_ack`]); this suspends the whole actor, which
	/// is the intended "per-document lock" serialization (§5). If the
	/// connection drops mid-round-trip the reply is dropped (the caller sees
	/// the usual "actor dropped reply" error) and [`Outcome::Reconnect`] is
	/// returned so `run` falls back into its reconnect loop.
	async fn handle_command<K: FrameSink, R: FrameSource>(
		&mut self,
		cmd: Command,
		sink: &mut K,
		source: &mut R,
	) -> Outcome {
		match cmd {
			Command::WriteFile { path, content, mode, reply } => match self
				.await_write_ack(sink, source, path, content, mode)
				.await
			{
				Ok(token) => {
					let _ = reply.send(token);
					Outcome::Continue
				}
				Err(err) => {
					warn!("client {}: write_file round trip failed: {}", self.user_id, err);
					drop(reply);
					Outcome::Reconnect
				}
			},
			Command::MoveFile { old, new, reply } => {
				let request = ControlMessage::MoveFile {
					user_id: self.user_id.clone(),
					session_id: self.session_id.clone(),
					old_path: old,
					new_path: new,
				};
				match self.await_structural_ack(sink, source, request).await {
					Ok(result) => {
						let _ = reply.send(result);
						Outcome::Continue
					}
					Err(err) => {
						warn!("client {}: move_file round trip failed: {}", self.user_id, err);
						drop(reply);
						Outcome::Reconnect
					}
				}
			}
			Command::DeleteFile { path, reply } => {
				let request = ControlMessage::DeleteFile {
					user_id: self.user_id.clone(),
					session_id: self.session_id.clone(),
					path,
				};
				match self.await_structural_ack(sink, source, request).await {
					Ok(result) => {
						let _ = reply.send(result);
						Outcome::Continue
					}
					Err(err) => {
						warn!("client {}: delete_file round trip failed: {}", self.user_id, err);
						drop(reply);
						Outcome::Reconnect
					}
				}
			}
			Command::ReadFile { path, reply } => {
				let _ = reply.send(self.document.text(&path));
				Outcome::Continue
			}
			Command::ListFiles { prefix, reply } => {
				let _ = reply.send(self.document.list_files(&prefix));
				Outcome::Continue
			}
			Command::UpdateActivity { patch, reply } => {
				let _ = reply.send(self.handle_update_activity(patch));
				Outcome::Continue
			}
			Command::ConnectionState { reply } => {
				let _ = reply.send(self.state);
				Outcome::Continue
			}
			Command::Shutdown { reply } => {
				let _ = reply.send(());
				Outcome::Shutdown
			}
		}
	}

	/// Runs the connect/sync/reconnect loop until `commands` closes or a
	/// `Shutdown` command arrives.
	async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
		// Only `update_activity` still transacts locally (Origin::Local); the
		// structural/write commands go through the hub directly and arrive
		// back here as Origin::Hub updates via `handle_inbound`.
		let mut local_updates = self.document.subscribe();
		let mut attempt: u32 = 0;

		'connect: loop {
			self.state = ConnectionState::Connecting;
			let transport = match self.connector.connect().await {
				Ok(transport) => transport,
				Err(err) => {
					warn!("client {}: connect failed: {}", self.user_id, err);
					if !self.wait_for_next_attempt(&mut attempt, &mut commands).await {
						return;
					}
					continue 'connect;
				}
			};
			let (mut sink, mut source) = transport.split();

			if let Err(err) = self.handshake(&mut sink).await {
				warn!("client {}: handshake failed: {}", self.user_id, err);
				if !self.wait_for_next_attempt(&mut attempt, &mut commands).await {
					return;
				}
				continue 'connect;
			}
			attempt = 0;
			self.state = ConnectionState::Connected;
			info!("client {}: connected to session {}", self.user_id, self.session_id);

			let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
			heartbeat.tick().await; // first tick fires immediately; discard

			loop {
				tokio::select! {
					cmd = commands.recv() => {
						match cmd {
							Some(cmd) => match self.handle_command(cmd, &mut sink, &mut source).await {
								Outcome::Continue => {}
								Outcome::Shutdown => return,
								Outcome::Reconnect => break,
							},
							None => return,
						}
					}
					frame = source.recv() => {
						match frame {
							Ok(Some(frame)) => self.handle_inbound(&mut sink, frame).await,
							Ok(None) => { warn!("client {}: connection closed by peer", self.user_id); break; }
							Err(err) => { warn!("client {}: transport error: {}", self.user_id, err); break; }
						}
					}
					update = local_updates.recv() => {
						if let Ok(update) = update {
							// Origin discipline (§4.E): only locally-produced
							// updates get pushed back out; hub/restore origin
							// updates must never be re-sent.
							if update.origin == Origin::Local {
								let _ = sink.send(Frame::Sync(SyncStep::Step2(update.bytes))).await;
							}
						}
					}
					_ = heartbeat.tick() => {
						let _ = sink.send(Frame::Custom(ControlMessage::Heartbeat {
							user_id: self.user_id.clone(),
							session_id: self.session_id.clone(),
						})).await;
					}
				}
			}

			self.state = ConnectionState::Disconnected;
			if !self.wait_for_next_attempt(&mut attempt, &mut commands).await {
				return;
			}
		}
	}

	/// Sends `join`, then both directions of the sync handshake: answers the
	/// hub's own step-0 with a step-1 diff, and sends our own step-0 so the
	/// hub's step-1 answer carries back everything we are missing — needed
	/// for a reconnecting replica to converge (S4, invariant 6), not just a
	/// fresh one.
	async fn handshake<K: FrameSink>(&mut self, sink: &mut K) -> ClResult<()> {
		sink.send(Frame::Custom(ControlMessage::Join {
			user_id: self.user_id.clone(),
			session_id: self.session_id.clone(),
		}))
		.await?;
		let sv = self.document.state_vector();
		sink.send(Frame::Sync(SyncStep::Step0(sv))).await
	}

	async fn handle_inbound<K: FrameSink>(&mut self, sink: &mut K, frame: Frame) {
		match frame {
			Frame::Custom(ControlMessage::Joined { data }) => {
				info!(
					"client {}: joined {} ({} participants, {} files)",
					self.user_id, data.session_id, data.stats.participant_count, data.stats.file_count
				);
			}
			Frame::Sync(SyncStep::Step0(remote_vector)) => {
				match self.document.encode_as_update(Some(&remote_vector)) {
					Ok(bytes) => {
						let _ = sink.send(Frame::Sync(SyncStep::Step1(bytes))).await;
					}
					Err(err) => warn!("client {}: failed to diff state vector: {}", self.user_id, err),
				}
			}
			Frame::Sync(SyncStep::Step1(bytes)) | Frame::Sync(SyncStep::Step2(bytes)) => {
				if let Err(err) = self.document.apply_update(&bytes, Origin::Hub) {
					warn!("client {}: rejected update from hub: {}", self.user_id, err);
				}
			}
			Frame::Custom(other) => {
				// participant_joined/left, activity_update, error: surfaced
				// to the caller would need a subscription channel; out of
				// scope for the document-mutation surface this actor owns.
				tracing::debug!("client {}: {:?}", self.user_id, other);
			}
			Frame::Awareness(_) => {}
		}
	}

	/// Sleeps for the backoff delay, unless `reconnect_max_attempts` has been
	/// exhausted (in which case the client gives up) or `Shutdown` arrives
	/// while waiting. Returns `false` when the caller should stop entirely.
	async fn wait_for_next_attempt(
		&mut self,
		attempt: &mut u32,
		commands: &mut mpsc::Receiver<Command>,
	) -> bool {
		if *attempt >= self.config.reconnect_max_attempts {
			self.state = ConnectionState::PermanentlyDisconnected;
			warn!("client {}: reconnect attempts exhausted, giving up", self.user_id);
			// Drain commands with a terminal error rather than hanging callers.
			while let Ok(cmd) = commands.try_recv() {
				fail_with_permanent_disconnect(cmd);
			}
			return false;
		}
		let delay = self.config.backoff_for_attempt(*attempt);
		*attempt += 1;
		tokio::select! {
			() = tokio::time::sleep(delay) => true,
			cmd = commands.recv() => {
				match cmd {
					Some(Command::Shutdown { reply }) => { let _ = reply.send(()); false }
					Some(cmd) => { fail_with_permanent_disconnect(cmd); true }
					None => false,
				}
			}
		}
	}
}

fn fail_with_permanent_disconnect(cmd: Command) {
	match cmd {
		Command::WriteFile { reply, .. } => drop(reply),
		Command::MoveFile { reply, .. } => {
			let _ = reply.send(StructuralResult {
				success: false,
				token: 0,
				error: Some(Error::PermanentDisconnect.to_string()),
			});
		}
		Command::DeleteFile { reply, .. } => {
			let _ = reply.send(StructuralResult {
				success: false,
				token: 0,
				error: Some(Error::PermanentDisconnect.to_string()),
			});
		}
		Command::ReadFile { reply, .. } => drop(reply),
		Command::ListFiles { reply, .. } => drop(reply),
		Command::UpdateActivity { reply, .. } => drop(reply),
		Command::ConnectionState { reply } => {
			let _ = reply.send(ConnectionState::PermanentlyDisconnected);
		}
		Command::Shutdown { reply } => {
			let _ = reply.send(());
		}
	}
}

const COMMAND_QUEUE_CAPACITY: usize = 64;

/// A cheap, cloneable handle to a running client actor.
#[derive(Clone)]
pub struct Client {
	cmd_tx: mpsc::Sender<Command>,
}

impl Client {
	/// Spawns the actor and immediately starts its connect loop.
	pub fn spawn<C: Connector + 'static>(
		user_id: impl Into<String>,
		session_id: impl Into<String>,
		connector: C,
		config: ClientConfig,
	) -> Self {
		let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
		let actor = ClientActor {
			user_id: user_id.into(),
			session_id: session_id.into(),
			document: Document::new(),
			connector,
			config,
			state: ConnectionState::Connecting,
		};
		tokio::spawn(actor.run(cmd_rx));
		Self { cmd_tx }
	}

	async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> ClResult<T> {
		let (reply, rx) = oneshot::channel();
		self.cmd_tx
			.send(make(reply))
			.await
			.map_err(|_| Error::Internal("client actor stopped".into()))?;
		rx.await.map_err(|_| Error::Internal("client actor dropped reply".into()))
	}

	pub async fn write_file(&self, path: impl Into<String>, content: impl Into<String>, mode: WriteMode) -> ClResult<i64> {
		let (path, content) = (path.into(), content.into());
		self.call(|reply| Command::WriteFile { path, content, mode, reply }).await
	}

	pub async fn move_file(&self, old: impl Into<String>, new: impl Into<String>) -> ClResult<StructuralResult> {
		let (old, new) = (old.into(), new.into());
		self.call(|reply| Command::MoveFile { old, new, reply }).await
	}

	pub async fn delete_file(&self, path: impl Into<String>) -> ClResult<StructuralResult> {
		let path = path.into();
		self.call(|reply| Command::DeleteFile { path, reply }).await
	}

	pub async fn read_file(&self, path: impl Into<String>) -> ClResult<Option<String>> {
		let path = path.into();
		self.call(|reply| Command::ReadFile { path, reply }).await
	}

	pub async fn list_files(&self, prefix: impl Into<String>) -> ClResult<Vec<(String, FileMeta)>> {
		let prefix = prefix.into();
		self.call(|reply| Command::ListFiles { prefix, reply }).await
	}

	pub async fn update_activity(&self, action: ActivityAction, current_file: Option<String>) -> ClResult<Activity> {
		let patch = ActivityPatch { current_file: Some(current_file), action: Some(action) };
		self.call(|reply| Command::UpdateActivity { patch, reply }).await
	}

	pub async fn connection_state(&self) -> ClResult<ConnectionState> {
		self.call(|reply| Command::ConnectionState { reply }).await
	}

	pub async fn shutdown(&self) -> ClResult<()> {
		self.call(|reply| Command::Shutdown { reply }).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::connector::testing::HubConnector;
	use collabfs_hub::{Hub, HubConfig};
	use std::sync::Arc;

	fn actor() -> ClientActor<HubConnector> {
		let hub = Arc::new(Hub::new(HubConfig::default(), None));
		ClientActor {
			user_id: "alice".to_string(),
			session_id: "s1".to_string(),
			document: Document::new(),
			connector: HubConnector::new(hub),
			config: ClientConfig::default(),
			state: ConnectionState::Connecting,
		}
	}

	fn spawn_client(hub: &Arc<Hub>, user_id: &str, session_id: &str) -> Client {
		Client::spawn(user_id, session_id, HubConnector::new(hub.clone()), ClientConfig::default())
	}

	async fn wait_connected(client: &Client) {
		for _ in 0..200 {
			if matches!(client.connection_state().await, Ok(ConnectionState::Connected)) {
				return;
			}
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
		}
		panic!("client never reached Connected");
	}

	#[test]
	fn update_activity_merges_and_stamps_time() {
		let mut a = actor();
		let activity = a.handle_update_activity(ActivityPatch {
			current_file: Some(Some("/a.txt".into())),
			action: Some(ActivityAction::Reading),
		});
		assert_eq!(activity.current_file.as_deref(), Some("/a.txt"));
		assert_eq!(activity.action, ActivityAction::Reading);

		let merged = a.handle_update_activity(ActivityPatch {
			current_file: None,
			action: Some(ActivityAction::Editing),
		});
		assert_eq!(merged.current_file.as_deref(), Some("/a.txt"));
		assert_eq!(merged.action, ActivityAction::Editing);
	}

	/// `write_file` round-trips through the hub's session actor (§4.B) and
	/// the replica's local document reflects it before the call resolves —
	/// otherwise a `read_file` right after would see stale content.
	#[tokio::test]
	async fn write_file_round_trips_through_hub_and_updates_local_replica() {
		let hub = Arc::new(Hub::new(HubConfig::default(), None));
		let client = spawn_client(&hub, "alice", "s1");
		wait_connected(&client).await;

		let token = client.write_file("/a.txt", "hello", WriteMode::Overwrite).await.unwrap();
		assert_eq!(token, 1);
		assert_eq!(client.read_file("/a.txt").await.unwrap().as_deref(), Some("hello"));
	}

	/// Two concurrent `move_file` requests racing for the same destination:
	/// the hub's session actor serializes them, so exactly one sees
	/// `success: true` (§4.B fencing policy, invariant/scenario S3) — never
	/// both, which would happen if each client decided locally.
	#[tokio::test]
	async fn concurrent_moves_to_same_destination_only_one_succeeds() {
		let hub = Arc::new(Hub::new(HubConfig::default(), None));
		let alice = spawn_client(&hub, "alice", "s1");
		let bob = spawn_client(&hub, "bob", "s1");
		wait_connected(&alice).await;
		wait_connected(&bob).await;

		alice.write_file("/a", "1", WriteMode::Overwrite).await.unwrap();
		alice.write_file("/b", "2", WriteMode::Overwrite).await.unwrap();
		// Wait for bob's replica to observe both files before racing the move.
		for _ in 0..200 {
			if bob.list_files("").await.unwrap().len() == 2 {
				break;
			}
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
		}

		let (r1, r2) = tokio::join!(alice.move_file("/a", "/dest"), bob.move_file("/b", "/dest"));
		let (r1, r2) = (r1.unwrap(), r2.unwrap());
		assert_ne!(r1.success, r2.success, "exactly one of the two racing moves must succeed");
	}
}

// vim: ts=4
