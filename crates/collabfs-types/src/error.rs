//! Error handling subsystem. Implements a custom Error type shared by every
//! collabfs crate, following the taxonomy from the protocol design (kinds,
//! not concrete wire names).

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// Precondition failure on `move`/`delete`: the source path is absent.
	FileMissing,
	/// Precondition failure on `move`: the destination path is already present.
	DestinationExists,
	/// The wire envelope could not be decoded.
	MalformedFrame(String),
	/// A sync/awareness frame arrived before `join`.
	UnknownSession,
	/// A peer's outbound queue stayed over the high-water mark.
	Backpressure,
	/// The snapshot store failed to read or write.
	SnapshotIoFailed(String),
	/// Reconnect attempts were exhausted.
	PermanentDisconnect,
	/// The CRDT library rejected an update or failed to encode one.
	Crdt(String),
	/// JSON (de)serialization of a custom control message failed.
	Json(String),
	/// Catch-all for invariant violations that should never happen.
	Internal(String),
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::FileMissing => write!(f, "file missing"),
			Error::DestinationExists => write!(f, "destination exists"),
			Error::MalformedFrame(msg) => write!(f, "malformed frame: {}", msg),
			Error::UnknownSession => write!(f, "unknown session"),
			Error::Backpressure => write!(f, "peer backpressure"),
			Error::SnapshotIoFailed(msg) => write!(f, "snapshot i/o failed: {}", msg),
			Error::PermanentDisconnect => write!(f, "reconnect attempts exhausted"),
			Error::Crdt(msg) => write!(f, "crdt error: {}", msg),
			Error::Json(msg) => write!(f, "json error: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Json(err.to_string())
	}
}

// vim: ts=4
