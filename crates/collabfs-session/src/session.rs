//! Session state (component B): one CRDT document, its participants, the
//! fencing-token counter, and the high-level file operations built on top.
//!
//! A session runs as a dedicated actor task reached through an `mpsc`
//! command queue (§5 "Scheduling"); the public [`Session`] handle is a
//! cheap clone of the channel sender, so callers never lock a mutex
//! directly — every operation is a channel round-trip, and the transaction
//! itself never suspends.

use std::collections::HashSet;
use std::sync::Arc;

use collabfs_crdt::{Document, Origin};
use collabfs_types::model::{
	Activity, ActivityAction, ActivityPatch, FileMeta, Operation, OperationKind, WriteMode,
};
use collabfs_types::utils::now_ms;
use collabfs_types::{ClResult, Error};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::snapshot_store::SnapshotStore;

/// Outcome of a structural operation (`move`/`delete`): both success and
/// failure are reported to the caller AND logged to `opLog` (§4.B).
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralResult {
	pub success: bool,
	pub token: i64,
	pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
	pub participant_count: u32,
	pub file_count: u32,
	pub op_count: u32,
}

enum Command {
	AddParticipant { user_id: String, reply: oneshot::Sender<()> },
	RemoveParticipant { user_id: String, reply: oneshot::Sender<()> },
	WriteFile {
		path: String,
		content: String,
		by: String,
		mode: WriteMode,
		reply: oneshot::Sender<i64>,
	},
	MoveFile { old: String, new: String, by: String, reply: oneshot::Sender<StructuralResult> },
	DeleteFile { path: String, by: String, reply: oneshot::Sender<StructuralResult> },
	UpdateActivity { user_id: String, patch: ActivityPatch, reply: oneshot::Sender<Activity> },
	ListFiles { prefix: String, reply: oneshot::Sender<Vec<(String, FileMeta)>> },
	Operations { reply: oneshot::Sender<Vec<Operation>> },
	Stats { reply: oneshot::Sender<SessionStats> },
	StateVector { reply: oneshot::Sender<Vec<u8>> },
	EncodeUpdate { remote_vector: Option<Vec<u8>>, reply: oneshot::Sender<ClResult<Vec<u8>>> },
	ApplyUpdate { bytes: Vec<u8>, origin: Origin, reply: oneshot::Sender<ClResult<()>> },
	Shutdown { reply: oneshot::Sender<()> },
}

struct SessionActor {
	session_id: String,
	document: Document,
	participants: HashSet<String>,
	token_counter: i64,
	snapshot_store: Option<Arc<dyn SnapshotStore>>,
	config: SessionConfig,
}

impl SessionActor {
	fn next_token(&mut self) -> i64 {
		self.token_counter += 1;
		self.token_counter
	}

	async fn take_snapshot(&self) {
		let Some(store) = &self.snapshot_store else { return };
		let bytes = match self.document.encode_as_update(None) {
			Ok(bytes) => bytes,
			Err(err) => {
				warn!("session {}: failed to encode snapshot: {}", self.session_id, err);
				return;
			}
		};
		if let Err(err) = store.put(&self.session_id, &bytes).await {
			warn!("session {}: snapshot write failed: {}", self.session_id, err);
		} else {
			debug!("session {}: snapshot written ({} bytes)", self.session_id, bytes.len());
		}
	}

	fn handle_write_file(&mut self, path: String, content: String, by: String, mode: WriteMode) -> i64 {
		let now = now_ms();
		let token = self.next_token();
		self.document.transact(Origin::Local, |txn, doc| {
			let existed = doc.file_meta_in(txn, &path).is_some();
			let prev_len = doc.file_meta_in(txn, &path).map_or(0, |m| m.size_bytes);
			match mode {
				WriteMode::Overwrite => doc.overwrite_text(txn, &path, &content),
				WriteMode::Append => doc.append_text(txn, &path, &content),
			}
			let size_bytes = match mode {
				WriteMode::Overwrite => content.len() as i64,
				WriteMode::Append => prev_len + content.len() as i64,
			};
			let meta = FileMeta {
				last_modified_ms: now,
				last_modified_by: by.clone(),
				token,
				size_bytes,
				is_binary: false,
			};
			doc.set_file_meta(txn, &path, &meta);
			let kind = if existed { OperationKind::Write } else { OperationKind::Create };
			doc.push_operation(
				txn,
				&Operation {
					token,
					kind,
					path: path.clone(),
					new_path: None,
					by: by.clone(),
					timestamp_ms: now,
					success: true,
					error: None,
				},
			);
		});
		token
	}

	fn handle_move_file(&mut self, old: String, new: String, by: String) -> StructuralResult {
		let now = now_ms();
		let token = self.next_token();
		let (success, token, error) = self.document.transact(Origin::Local, |txn, doc| {
			let old_meta = doc.file_meta_in(txn, &old);
			let new_exists = doc.file_meta_in(txn, &new).is_some();
			let (success, error) = match (&old_meta, new_exists) {
				(None, _) => (false, Some("file missing".to_string())),
				(Some(_), true) => (false, Some("destination exists".to_string())),
				(Some(_), false) => (true, None),
			};
			if success {
				if let Some(mut meta) = old_meta {
					doc.copy_text(txn, &old, &new);
					meta.last_modified_ms = now;
					meta.last_modified_by = by.clone();
					meta.token = token;
					doc.set_file_meta(txn, &new, &meta);
					doc.remove_text(txn, &old);
					doc.remove_file_meta(txn, &old);
				}
			}
			doc.push_operation(
				txn,
				&Operation {
					token,
					kind: OperationKind::Move,
					path: old.clone(),
					new_path: Some(new.clone()),
					by: by.clone(),
					timestamp_ms: now,
					success,
					error: error.clone(),
				},
			);
			(success, token, error)
		});
		StructuralResult { success, token, error }
	}

	fn handle_delete_file(&mut self, path: String, by: String) -> StructuralResult {
		let now = now_ms();
		let token = self.next_token();
		let (success, token, error) = self.document.transact(Origin::Local, |txn, doc| {
			let existed = doc.file_meta_in(txn, &path).is_some();
			let (success, error) =
				if existed { (true, None) } else { (false, Some("file missing".to_string())) };
			if success {
				doc.remove_text(txn, &path);
				doc.remove_file_meta(txn, &path);
			}
			doc.push_operation(
				txn,
				&Operation {
					token,
					kind: OperationKind::Delete,
					path: path.clone(),
					new_path: None,
					by: by.clone(),
					timestamp_ms: now,
					success,
					error: error.clone(),
				},
			);
			(success, token, error)
		});
		StructuralResult { success, token, error }
	}

	fn handle_update_activity(&mut self, user_id: String, patch: ActivityPatch) -> Activity {
		let now = now_ms();
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

	fn handle_remove_participant(&mut self, user_id: &str) {
		self.participants.remove(user_id);
		self.document.transact(Origin::Local, |txn, doc| {
			doc.remove_activity(txn, user_id);
		});
	}

	fn stats(&self) -> SessionStats {
		SessionStats {
			participant_count: self.participants.len() as u32,
			file_count: self.document.list_files("").len() as u32,
			op_count: self.document.operation_count(),
		}
	}

	async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
		let mut snapshot_timer = tokio::time::interval(self.config.snapshot_interval);
		snapshot_timer.tick().await; // first tick fires immediately; discard
		loop {
			tokio::select! {
				cmd = commands.recv() => {
					let Some(cmd) = cmd else { break };
					if self.handle_command(cmd).await {
						break;
					}
				}
				_ = snapshot_timer.tick() => {
					self.take_snapshot().await;
				}
			}
		}
		info!("session {}: actor stopped", self.session_id);
	}

	/// Returns `true` if the actor should stop after this command.
	async fn handle_command(&mut self, cmd: Command) -> bool {
		match cmd {
			Command::AddParticipant { user_id, reply } => {
				self.participants.insert(user_id);
				let _ = reply.send(());
			}
			Command::RemoveParticipant { user_id, reply } => {
				self.handle_remove_participant(&user_id);
				let _ = reply.send(());
			}
			Command::WriteFile { path, content, by, mode, reply } => {
				let token = self.handle_write_file(path, content, by, mode);
				let _ = reply.send(token);
			}
			Command::MoveFile { old, new, by, reply } => {
				let result = self.handle_move_file(old, new, by);
				let _ = reply.send(result);
			}
			Command::DeleteFile { path, by, reply } => {
				let result = self.handle_delete_file(path, by);
				let _ = reply.send(result);
			}
			Command::UpdateActivity { user_id, patch, reply } => {
				let activity = self.handle_update_activity(user_id, patch);
				let _ = reply.send(activity);
			}
			Command::ListFiles { prefix, reply } => {
				let _ = reply.send(self.document.list_files(&prefix));
			}
			Command::Operations { reply } => {
				let _ = reply.send(self.document.operations());
			}
			Command::Stats { reply } => {
				let _ = reply.send(self.stats());
			}
			Command::StateVector { reply } => {
				let _ = reply.send(self.document.state_vector());
			}
			Command::EncodeUpdate { remote_vector, reply } => {
				let result = self
					.document
					.encode_as_update(remote_vector.as_deref())
					.map_err(Error::from);
				let _ = reply.send(result);
			}
			Command::ApplyUpdate { bytes, origin, reply } => {
				let result = self.document.apply_update(&bytes, origin).map_err(Error::from);
				let _ = reply.send(result);
			}
			Command::Shutdown { reply } => {
				self.take_snapshot().await;
				let _ = reply.send(());
				return true;
			}
		}
		false
	}
}

/// A cheap, cloneable handle to a running session actor.
#[derive(Clone)]
pub struct Session {
	session_id: String,
	created_at_ms: i64,
	cmd_tx: mpsc::Sender<Command>,
}

const COMMAND_QUEUE_CAPACITY: usize = 256;

impl Session {
	/// Spawns a fresh session, restoring from `snapshot_store` if a
	/// snapshot for `session_id` exists and is not corrupt (§4.F).
	pub async fn spawn(
		session_id: impl Into<String>,
		config: SessionConfig,
		snapshot_store: Option<Arc<dyn SnapshotStore>>,
	) -> Self {
		let session_id = session_id.into();
		let document = Document::new();
		if let Some(store) = &snapshot_store {
			match store.get(&session_id).await {
				Ok(Some(bytes)) => {
					if let Err(err) = document.apply_update(&bytes, Origin::Restore) {
						warn!("session {}: discarding corrupt snapshot: {}", session_id, err);
					} else {
						info!("session {}: restored from snapshot", session_id);
					}
				}
				Ok(None) => {}
				Err(err) => warn!("session {}: failed to load snapshot: {}", session_id, err),
			}
		}
		let created_at_ms = now_ms();
		let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
		let actor = SessionActor {
			session_id: session_id.clone(),
			document,
			participants: HashSet::new(),
			token_counter: 0,
			snapshot_store,
			config,
		};
		tokio::spawn(actor.run(cmd_rx));
		Self { session_id, created_at_ms, cmd_tx }
	}

	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	pub fn created_at_ms(&self) -> i64 {
		self.created_at_ms
	}

	async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> ClResult<T> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.cmd_tx
			.send(make(reply_tx))
			.await
			.map_err(|_| Error::Internal("session actor is gone".into()))?;
		reply_rx.await.map_err(|_| Error::Internal("session actor dropped the reply".into()))
	}

	pub async fn add_participant(&self, user_id: impl Into<String>) -> ClResult<()> {
		let user_id = user_id.into();
		self.call(|reply| Command::AddParticipant { user_id, reply }).await
	}

	pub async fn remove_participant(&self, user_id: impl Into<String>) -> ClResult<()> {
		let user_id = user_id.into();
		self.call(|reply| Command::RemoveParticipant { user_id, reply }).await
	}

	pub async fn write_file(
		&self,
		path: impl Into<String>,
		content: impl Into<String>,
		by: impl Into<String>,
		mode: WriteMode,
	) -> ClResult<i64> {
		let (path, content, by) = (path.into(), content.into(), by.into());
		self.call(|reply| Command::WriteFile { path, content, by, mode, reply }).await
	}

	pub async fn move_file(
		&self,
		old: impl Into<String>,
		new: impl Into<String>,
		by: impl Into<String>,
	) -> ClResult<StructuralResult> {
		let (old, new, by) = (old.into(), new.into(), by.into());
		self.call(|reply| Command::MoveFile { old, new, by, reply }).await
	}

	pub async fn delete_file(
		&self,
		path: impl Into<String>,
		by: impl Into<String>,
	) -> ClResult<StructuralResult> {
		let (path, by) = (path.into(), by.into());
		self.call(|reply| Command::DeleteFile { path, by, reply }).await
	}

	pub async fn update_activity(
		&self,
		user_id: impl Into<String>,
		patch: ActivityPatch,
	) -> ClResult<Activity> {
		let user_id = user_id.into();
		self.call(|reply| Command::UpdateActivity { user_id, patch, reply }).await
	}

	pub async fn list_files(&self, prefix: impl Into<String>) -> ClResult<Vec<(String, FileMeta)>> {
		let prefix = prefix.into();
		self.call(|reply| Command::ListFiles { prefix, reply }).await
	}

	pub async fn operations(&self) -> ClResult<Vec<Operation>> {
		self.call(|reply| Command::Operations { reply }).await
	}

	pub async fn stats(&self) -> ClResult<SessionStats> {
		self.call(|reply| Command::Stats { reply }).await
	}

	pub async fn state_vector(&self) -> ClResult<Vec<u8>> {
		self.call(|reply| Command::StateVector { reply }).await
	}

	pub async fn encode_as_update(&self, remote_vector: Option<Vec<u8>>) -> ClResult<Vec<u8>> {
		self.call(|reply| Command::EncodeUpdate { remote_vector, reply }).await?
	}

	pub async fn apply_update(&self, bytes: Vec<u8>, origin: Origin) -> ClResult<()> {
		self.call(|reply| Command::ApplyUpdate { bytes, origin, reply }).await?
	}

	/// Bytes to persist as this session's snapshot (§4.F): a full encode of
	/// the underlying document, which therefore also carries the op-log.
	pub async fn snapshot_bytes(&self) -> ClResult<Vec<u8>> {
		self.encode_as_update(None).await
	}

	/// Cancels the snapshot timer, takes one final snapshot, and stops the
	/// actor. Resolves only after the final snapshot attempt returns.
	pub async fn shutdown(&self) -> ClResult<()> {
		self.call(|reply| Command::Shutdown { reply }).await
	}
}

// vim: ts=4
