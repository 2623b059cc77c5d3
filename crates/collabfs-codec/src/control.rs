//! Custom control messages: the UTF-8 JSON payload carried inside a kind-2
//! frame (§4.C, wire schema in §6). Field names follow the wire schema
//! literally (`userId`, `sessionId`, `currentFile`) even though the rest of
//! this workspace is snake_case internally — this is the one boundary where
//! the external byte format is spelled out.

use collabfs_types::model::WriteMode;
use serde::{Deserialize, Serialize};

/// Presence fields carried by `update_activity` and `activity_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityWire {
	pub action: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub current_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedStats {
	pub participant_count: u32,
	pub file_count: u32,
	pub op_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedData {
	pub session_id: String,
	pub stats: JoinedStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantData {
	pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUpdateData {
	pub user_id: String,
	pub activity: ActivityWire,
}

/// Ack for a `write_file` request: always succeeds (§4.B), so there is no
/// `error` field — only the token the hub assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteAckData {
	pub path: String,
	pub token: i64,
}

/// Ack for a `move_file`/`delete_file` request, mirroring
/// `collabfs_session::StructuralResult` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralAckData {
	pub path: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub new_path: Option<String>,
	pub success: bool,
	pub token: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// One custom control message, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
	Join {
		#[serde(rename = "userId")]
		user_id: String,
		#[serde(rename = "sessionId")]
		session_id: String,
	},
	Leave {
		#[serde(rename = "userId")]
		user_id: String,
		#[serde(rename = "sessionId")]
		session_id: String,
	},
	Heartbeat {
		#[serde(rename = "userId")]
		user_id: String,
		#[serde(rename = "sessionId")]
		session_id: String,
	},
	UpdateActivity {
		#[serde(rename = "userId")]
		user_id: String,
		#[serde(rename = "sessionId")]
		session_id: String,
		activity: ActivityWire,
	},
	/// Request: perform a content write on the session's document (§4.B
	/// `write_file`). The hub is the single writer for every session, so
	/// this — not a local CRDT transaction — is how a client's writes
	/// reach the op-log.
	WriteFile {
		#[serde(rename = "userId")]
		user_id: String,
		#[serde(rename = "sessionId")]
		session_id: String,
		path: String,
		content: String,
		mode: WriteMode,
	},
	/// Request: perform `move_file` under the hub's fencing policy (§4.B).
	MoveFile {
		#[serde(rename = "userId")]
		user_id: String,
		#[serde(rename = "sessionId")]
		session_id: String,
		#[serde(rename = "oldPath")]
		old_path: String,
		#[serde(rename = "newPath")]
		new_path: String,
	},
	/// Request: perform `delete_file` under the hub's fencing policy (§4.B).
	DeleteFile {
		#[serde(rename = "userId")]
		user_id: String,
		#[serde(rename = "sessionId")]
		session_id: String,
		path: String,
	},
	WriteAck {
		data: WriteAckData,
	},
	StructuralAck {
		data: StructuralAckData,
	},
	Joined {
		data: JoinedData,
	},
	ParticipantJoined {
		data: ParticipantData,
	},
	ParticipantLeft {
		data: ParticipantData,
	},
	ActivityUpdate {
		data: ActivityUpdateData,
	},
	Error {
		error: String,
	},
}

impl ControlMessage {
	/// Serializes to the UTF-8 JSON string carried as a kind-2 frame payload.
	pub fn to_json(&self) -> Result<String, collabfs_types::Error> {
		serde_json::to_string(self).map_err(collabfs_types::Error::from)
	}

	/// Parses a kind-2 frame payload back into a control message.
	pub fn from_json(payload: &str) -> Result<Self, collabfs_types::Error> {
		serde_json::from_str(payload).map_err(collabfs_types::Error::from)
	}
}


// vim: ts=4
