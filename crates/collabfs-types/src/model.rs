//! Domain model shared by the CRDT document, the session, the hub and the
//! client replica: file metadata, the operation-log entry shape, and
//! per-user activity/presence.

use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type SessionId = String;
pub type Path = String;

/// How `write_file` should combine new content with what is already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
	Overwrite,
	Append,
}

/// Metadata entry in the `fileTree` container. Paired 1:1 with a
/// `fileContents` entry (invariant I1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
	pub last_modified_ms: i64,
	pub last_modified_by: UserId,
	pub token: i64,
	pub size_bytes: i64,
	pub is_binary: bool,
}

/// The kind of structural/content change an `Operation` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
	Create,
	Write,
	Move,
	Delete,
}

impl OperationKind {
	pub fn as_str(self) -> &'static str {
		match self {
			OperationKind::Create => "create",
			OperationKind::Write => "write",
			OperationKind::Move => "move",
			OperationKind::Delete => "delete",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"create" => Some(OperationKind::Create),
			"write" => Some(OperationKind::Write),
			"move" => Some(OperationKind::Move),
			"delete" => Some(OperationKind::Delete),
			_ => None,
		}
	}
}

/// One append-only entry in `opLog`. Never mutated or removed once appended
/// (invariant I3), including failed structural operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
	pub token: i64,
	pub kind: OperationKind,
	pub path: Path,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub new_path: Option<Path>,
	pub by: UserId,
	pub timestamp_ms: i64,
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// What a participant is presently doing. Mirrored both as a broadcast
/// frame and as a CRDT container entry (§9 "Activity duplication").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
	Idle,
	Reading,
	Editing,
	Moving,
	Deleting,
}

impl ActivityAction {
	pub fn as_str(self) -> &'static str {
		match self {
			ActivityAction::Idle => "idle",
			ActivityAction::Reading => "reading",
			ActivityAction::Editing => "editing",
			ActivityAction::Moving => "moving",
			ActivityAction::Deleting => "deleting",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"idle" => Some(ActivityAction::Idle),
			"reading" => Some(ActivityAction::Reading),
			"editing" => Some(ActivityAction::Editing),
			"moving" => Some(ActivityAction::Moving),
			"deleting" => Some(ActivityAction::Deleting),
			_ => None,
		}
	}
}

/// Presence entry in the `activity` container. Lives only while the user is
/// a participant; removed on departure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
	pub user_id: UserId,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub current_file: Option<Path>,
	pub action: ActivityAction,
	pub timestamp_ms: i64,
}

/// Partial update applied on top of an existing `Activity` (or a fresh
/// default if the user has none yet) by `update_activity`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPatch {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub current_file: Option<Option<Path>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub action: Option<ActivityAction>,
}

// vim: ts=4
