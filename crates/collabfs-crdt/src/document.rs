//! The shared CRDT document: four root containers (`fileTree`,
//! `fileContents`, `opLog`, `activity`) over a single `yrs::Doc`.
//!
//! This is component A of the design: a black box exposing
//! `state_vector`, `encode_as_update`, `apply_update` and a change
//! notification carrying `(bytes, origin)`. Nothing above this module
//! inspects update bytes directly — only `yrs` does.

use crate::error::Error;
use collabfs_types::model::{Activity, FileMeta, Operation};
use tokio::sync::broadcast;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{
	Array, ArrayRef, Doc, GetString, Map, MapRef, ReadTxn, StateVector, Text, TextPrelim, TextRef,
	Transact, TransactionMut, Update, Value,
};

/// Tag on a document-change notification: who produced the update. The wire
/// protocol never carries this — it lets listeners (hub fan-out, client
/// push-on-local-change) apply the origin-discipline rule without
/// re-deriving it from context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
	/// Produced by a local transaction on this replica.
	Local,
	/// Applied from bytes received from the hub or a peer.
	Hub,
	/// Applied while restoring from a snapshot.
	Restore,
}

/// One change notification: the update bytes plus where they came from.
#[derive(Debug, Clone)]
pub struct DocUpdate {
	pub bytes: Vec<u8>,
	pub origin: Origin,
}

const FILE_TREE: &str = "fileTree";
const FILE_CONTENTS: &str = "fileContents";
const OP_LOG: &str = "opLog";
const ACTIVITY: &str = "activity";

/// Capacity of the broadcast channel each `Document` uses to fan out its own
/// update notifications to listeners within the same process (hub fan-out,
/// client origin-filtered push).
const UPDATE_CHANNEL_CAPACITY: usize = 1024;

pub struct Document {
	doc: Doc,
	file_tree: MapRef,
	file_contents: MapRef,
	op_log: ArrayRef,
	activity: MapRef,
	updates_tx: broadcast::Sender<DocUpdate>,
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Document {
	pub fn new() -> Self {
		let doc = Doc::new();
		let file_tree = doc.get_or_insert_map(FILE_TREE);
		let file_contents = doc.get_or_insert_map(FILE_CONTENTS);
		let op_log = doc.get_or_insert_array(OP_LOG);
		let activity = doc.get_or_insert_map(ACTIVITY);
		let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
		Self { doc, file_tree, file_contents, op_log, activity, updates_tx }
	}

	/// Subscribe to this document's own change notifications.
	pub fn subscribe(&self) -> broadcast::Receiver<DocUpdate> {
		self.updates_tx.subscribe()
	}

	/// Compact summary of what this replica has seen.
	pub fn state_vector(&self) -> Vec<u8> {
		self.doc.transact().state_vector().encode_v1()
	}

	/// The diff the peer identified by `remote_vector` is missing, or the
	/// full state if no vector is given.
	pub fn encode_as_update(&self, remote_vector: Option<&[u8]>) -> Result<Vec<u8>, Error> {
		let sv = match remote_vector {
			Some(bytes) => {
				StateVector::decode_v1(bytes).map_err(|e| Error::Decode(e.to_string()))?
			}
			None => StateVector::default(),
		};
		Ok(self.doc.transact().encode_state_as_update_v1(&sv))
	}

	/// Integrate update bytes atomically and notify listeners of the change.
	/// Applying the same bytes twice is a no-op at the document level (yrs
	/// updates are idempotent); the notification still fires both times.
	pub fn apply_update(&self, bytes: &[u8], origin: Origin) -> Result<(), Error> {
		let update = Update::decode_v1(bytes).map_err(|e| Error::Decode(e.to_string()))?;
		{
			let mut txn = self.doc.transact_mut();
			txn.apply_update(update).map_err(|e| Error::Apply(e.to_string()))?;
		}
		let _ = self.updates_tx.send(DocUpdate { bytes: bytes.to_vec(), origin });
		Ok(())
	}

	/// Run one atomic transaction against the document. If it changed
	/// anything, emit exactly one update notification tagged with `origin`
	/// — this is what keeps a multi-field change (content + metadata +
	/// op-log entry) atomic for peers, per §4.B.
	pub fn transact<R>(&self, origin: Origin, f: impl FnOnce(&mut TransactionMut, &Document) -> R) -> R {
		let sv_before = self.doc.transact().state_vector();
		let result = {
			let mut txn = self.doc.transact_mut();
			f(&mut txn, self)
		};
		let update = self.doc.transact().encode_state_as_update_v1(&sv_before);
		if !update.is_empty() {
			let _ = self.updates_tx.send(DocUpdate { bytes: update, origin });
		}
		result
	}

	// ---------------------------------------------------------------
	// fileTree
	// ---------------------------------------------------------------

	pub fn file_meta(&self, path: &str) -> Option<FileMeta> {
		let txn = self.doc.transact();
		self.file_tree
			.get(&txn, path)
			.and_then(|v| serde_json::from_str(&v.to_string(&txn)).ok())
	}

	pub fn set_file_meta(&self, txn: &mut TransactionMut, path: &str, meta: &FileMeta) {
		let json = serde_json::to_string(meta).unwrap_or_default();
		self.file_tree.insert(txn, path, json);
	}

	pub fn remove_file_meta(&self, txn: &mut TransactionMut, path: &str) {
		self.file_tree.remove(txn, path);
	}

	pub fn has_file(&self, path: &str) -> bool {
		let txn = self.doc.transact();
		self.file_tree.get(&txn, path).is_some()
	}

	/// Same as [`Self::has_file`] but reads through an already-open write
	/// transaction — callers inside a [`Self::transact`] closure must use
	/// this instead, since `yrs` does not allow a second transaction to be
	/// opened on the same document while one is already active.
	pub fn has_file_in(&self, txn: &mut TransactionMut, path: &str) -> bool {
		self.file_tree.get(txn, path).is_some()
	}

	/// Same as [`Self::file_meta`] but reads through an already-open write
	/// transaction.
	pub fn file_meta_in(&self, txn: &mut TransactionMut, path: &str) -> Option<FileMeta> {
		self.file_tree
			.get(txn, path)
			.and_then(|v| serde_json::from_str(&v.to_string(txn)).ok())
	}

	/// All `(path, meta)` pairs whose path starts with `prefix` (empty
	/// prefix matches everything).
	pub fn list_files(&self, prefix: &str) -> Vec<(String, FileMeta)> {
		let txn = self.doc.transact();
		self.file_tree
			.iter(&txn)
			.filter(|(path, _)| path.starts_with(prefix))
			.filter_map(|(path, value)| {
				serde_json::from_str::<FileMeta>(&value.to_string(&txn))
					.ok()
					.map(|meta| (path.to_string(), meta))
			})
			.collect()
	}

	// ---------------------------------------------------------------
	// fileContents
	// ---------------------------------------------------------------

	pub fn text(&self, path: &str) -> Option<String> {
		let txn = self.doc.transact();
		self.file_contents.get(&txn, path).map(|v| v.to_string(&txn))
	}

	fn ensure_text(&self, txn: &mut TransactionMut, path: &str) -> TextRef {
		match self.file_contents.get(txn, path) {
			Some(Value::YText(text_ref)) => text_ref,
			_ => self.file_contents.insert(txn, path, TextPrelim::new("")),
		}
	}

	/// Replace the full content of `path`: delete `[0, len)` then insert at
	/// 0, per §4.B `write_file` (overwrite mode).
	pub fn overwrite_text(&self, txn: &mut TransactionMut, path: &str, content: &str) {
		let text = self.ensure_text(txn, path);
		let len = text.len(txn);
		if len > 0 {
			text.remove_range(txn, 0, len);
		}
		if !content.is_empty() {
			text.insert(txn, 0, content);
		}
	}

	/// Insert `content` at the current end of `path`, per §4.B `write_file`
	/// (append mode).
	pub fn append_text(&self, txn: &mut TransactionMut, path: &str, content: &str) {
		let text = self.ensure_text(txn, path);
		let len = text.len(txn);
		text.insert(txn, len, content);
	}

	/// Insert `content` at `index` within `path`'s text, exercising the
	/// character-level merge directly rather than going through a whole-file
	/// `overwrite`/`append` — two replicas inserting at the same index from
	/// the same base state is how invariant I4/scenario S2's same-path race
	/// actually arises.
	pub fn insert_text(&self, txn: &mut TransactionMut, path: &str, index: u32, content: &str) {
		let text = self.ensure_text(txn, path);
		text.insert(txn, index, content);
	}

	/// Copy the text content of `from` into `to` (used by `move_file`, which
	/// must leave both paths byte-identical at the moment of the move per
	/// I4, then delete the source).
	pub fn copy_text(&self, txn: &mut TransactionMut, from: &str, to: &str) {
		let content = self.file_contents.get(txn, from).map(|v| v.to_string(txn)).unwrap_or_default();
		let dest = self.ensure_text(txn, to);
		dest.insert(txn, 0, &content);
	}

	pub fn remove_text(&self, txn: &mut TransactionMut, path: &str) {
		self.file_contents.remove(txn, path);
	}

	// ---------------------------------------------------------------
	// opLog
	// ---------------------------------------------------------------

	/// Append one entry. The op-log is append-only: there is no corresponding
	/// remove/update method (invariant I3).
	pub fn push_operation(&self, txn: &mut TransactionMut, op: &Operation) {
		let json = serde_json::to_string(op).unwrap_or_default();
		self.op_log.push_back(txn, json);
	}

	pub fn operations(&self) -> Vec<Operation> {
		let txn = self.doc.transact();
		self.op_log
			.iter(&txn)
			.filter_map(|value| serde_json::from_str(&value.to_string(&txn)).ok())
			.collect()
	}

	pub fn operation_count(&self) -> u32 {
		let txn = self.doc.transact();
		self.op_log.len(&txn)
	}

	// ---------------------------------------------------------------
	// activity
	// ---------------------------------------------------------------

	pub fn activity_for(&self, user_id: &str) -> Option<Activity> {
		let txn = self.doc.transact();
		self.activity
			.get(&txn, user_id)
			.and_then(|v| serde_json::from_str(&v.to_string(&txn)).ok())
	}

	/// Same as [`Self::activity_for`] but reads through an already-open
	/// write transaction.
	pub fn activity_for_in(&self, txn: &mut TransactionMut, user_id: &str) -> Option<Activity> {
		self.activity
			.get(txn, user_id)
			.and_then(|v| serde_json::from_str(&v.to_string(txn)).ok())
	}

	pub fn set_activity(&self, txn: &mut TransactionMut, activity: &Activity) {
		let json = serde_json::to_string(activity).unwrap_or_default();
		self.activity.insert(txn, activity.user_id.clone(), json);
	}

	pub fn remove_activity(&self, txn: &mut TransactionMut, user_id: &str) {
		self.activity.remove(txn, user_id);
	}

	pub fn all_activity(&self) -> Vec<Activity> {
		let txn = self.doc.transact();
		self.activity
			.iter(&txn)
			.filter_map(|(_, value)| serde_json::from_str(&value.to_string(&txn)).ok())
			.collect()
	}
}

// vim: ts=4
