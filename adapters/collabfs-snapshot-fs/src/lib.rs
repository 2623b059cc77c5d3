//! Filesystem-backed implementation of `collabfs_session::SnapshotStore`
//! (component F): one opaque file per session, named `<session_id>.snapshot`,
//! holding the bytes of a full `encode_as_update()` of that session's
//! document.
//!
//! Writes go through a temp-file-then-rename to avoid torn writes on the
//! common path, but per §4.F this is not a durability guarantee — a crash
//! mid-write can still leave a corrupt file, and `get` is required to treat
//! that as "absent" rather than propagate a decode error.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use collabfs_crdt::{Document, Origin};
use collabfs_session::SnapshotStore;
use collabfs_types::utils::random_id;
use collabfs_types::{ClResult, Error};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

fn snapshot_path(base_dir: &Path, session_id: &str) -> PathBuf {
	base_dir.join(format!("{session_id}.snapshot"))
}

fn tmp_path(base_dir: &Path) -> PathBuf {
	base_dir.join(format!("tmp-{}.snapshot", random_id()))
}

#[derive(Debug)]
pub struct SnapshotStoreFs {
	base_dir: PathBuf,
}

impl SnapshotStoreFs {
	pub async fn new(base_dir: impl Into<PathBuf>) -> ClResult<Self> {
		let base_dir = base_dir.into();
		tokio::fs::create_dir_all(&base_dir)
			.await
			.map_err(|e| Error::SnapshotIoFailed(e.to_string()))?;
		Ok(Self { base_dir })
	}
}

#[async_trait]
impl SnapshotStore for SnapshotStoreFs {
	async fn put(&self, session_id: &str, bytes: &[u8]) -> ClResult<()> {
		let tmp = tmp_path(&self.base_dir);
		let mut file =
			File::create(&tmp).await.map_err(|e| Error::SnapshotIoFailed(e.to_string()))?;
		file.write_all(bytes).await.map_err(|e| Error::SnapshotIoFailed(e.to_string()))?;
		file.flush().await.map_err(|e| Error::SnapshotIoFailed(e.to_string()))?;
		drop(file);
		tokio::fs::rename(&tmp, snapshot_path(&self.base_dir, session_id))
			.await
			.map_err(|e| Error::SnapshotIoFailed(e.to_string()))?;
		debug!("snapshot written for session {} ({} bytes)", session_id, bytes.len());
		Ok(())
	}

	async fn get(&self, session_id: &str) -> ClResult<Option<Vec<u8>>> {
		let path = snapshot_path(&self.base_dir, session_id);
		let mut file = match File::open(&path).await {
			Ok(file) => file,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(Error::SnapshotIoFailed(e.to_string())),
		};
		let mut bytes = Vec::new();
		file.read_to_end(&mut bytes).await.map_err(|e| Error::SnapshotIoFailed(e.to_string()))?;

		// A torn snapshot must read back as absent (§4.F): validate by
		// attempting a full apply against a scratch document.
		let probe = Document::new();
		if let Err(err) = probe.apply_update(&bytes, Origin::Restore) {
			warn!("snapshot for session {} is corrupt, treating as absent: {}", session_id, err);
			return Ok(None);
		}
		Ok(Some(bytes))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn put_then_get_round_trips() {
		let dir = tempfile::tempdir().expect("tempdir");
		let store = SnapshotStoreFs::new(dir.path()).await.expect("new");
		store.put("s1", b"hello").await.expect("put");
		let bytes = store.get("s1").await.expect("get");
		// Not a real crdt update, so the validity probe should reject it —
		// this confirms `put`/`get` go through the same path as a real
		// snapshot, not that garbage round-trips.
		assert!(bytes.is_none());
	}

	#[tokio::test]
	async fn get_missing_session_is_none() {
		let dir = tempfile::tempdir().expect("tempdir");
		let store = SnapshotStoreFs::new(dir.path()).await.expect("new");
		assert!(store.get("never-seen").await.expect("get").is_none());
	}

	#[tokio::test]
	async fn real_document_snapshot_round_trips() {
		let dir = tempfile::tempdir().expect("tempdir");
		let store = SnapshotStoreFs::new(dir.path()).await.expect("new");

		let doc = Document::new();
		doc.transact(Origin::Local, |txn, d| {
			d.overwrite_text(txn, "/a.txt", "hello");
		});
		let bytes = doc.encode_as_update(None).expect("encode");
		store.put("s1", &bytes).await.expect("put");

		let loaded = store.get("s1").await.expect("get").expect("present");
		let restored = Document::new();
		restored.apply_update(&loaded, Origin::Restore).expect("apply");
		assert_eq!(restored.text("/a.txt").as_deref(), Some("hello"));
	}

	#[tokio::test]
	async fn corrupt_snapshot_file_reads_back_as_absent() {
		let dir = tempfile::tempdir().expect("tempdir");
		let store = SnapshotStoreFs::new(dir.path()).await.expect("new");
		tokio::fs::write(dir.path().join("s1.snapshot"), b"not a crdt update")
			.await
			.expect("write garbage");
		assert!(store.get("s1").await.expect("get").is_none());
	}

	#[tokio::test]
	async fn put_overwrites_prior_snapshot() {
		let dir = tempfile::tempdir().expect("tempdir");
		let store = SnapshotStoreFs::new(dir.path()).await.expect("new");

		let doc1 = Document::new();
		doc1.transact(Origin::Local, |txn, d| d.overwrite_text(txn, "/a", "v1"));
		store.put("s1", &doc1.encode_as_update(None).expect("encode")).await.expect("put v1");

		let doc2 = Document::new();
		doc2.transact(Origin::Local, |txn, d| d.overwrite_text(txn, "/a", "v2"));
		store.put("s1", &doc2.encode_as_update(None).expect("encode")).await.expect("put v2");

		let loaded = store.get("s1").await.expect("get").expect("present");
		let restored = Document::new();
		restored.apply_update(&loaded, Origin::Restore).expect("apply");
		assert_eq!(restored.text("/a").as_deref(), Some("v2"));
	}
}

// vim: ts=4
