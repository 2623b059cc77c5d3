//! The pluggable persistence seam (component F): byte-addressed storage of
//! `session_id -> opaque CRDT state bytes`. The reference implementation
//! lives in the `collabfs-snapshot-fs` adapter crate; this trait is what
//! keeps `collabfs-session` free of a direct filesystem dependency.

use async_trait::async_trait;
use collabfs_types::ClResult;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
	/// Persists `bytes` as the snapshot for `session_id`, replacing any
	/// prior snapshot. Not required to be atomic across a process crash —
	/// a torn write must surface as `get` returning `Ok(None)`.
	async fn put(&self, session_id: &str, bytes: &[u8]) -> ClResult<()>;

	/// Loads the snapshot for `session_id`, or `None` if absent or corrupt.
	async fn get(&self, session_id: &str) -> ClResult<Option<Vec<u8>>>;
}

// vim: ts=4
