//! Corrupt-snapshot handling and the S5 "snapshot survives restart"
//! scenario, exercising `collabfs-session` and `collabfs-snapshot-fs`
//! together.

use std::sync::Arc;

use collabfs_session::{Session, SessionConfig, SnapshotStore};
use collabfs_snapshot_fs::SnapshotStoreFs;
use collabfs_types::model::WriteMode;
use tempfile::TempDir;

async fn create_test_store() -> (Arc<SnapshotStoreFs>, TempDir) {
	let temp_dir = TempDir::new().expect("failed to create temp directory");
	let store = SnapshotStoreFs::new(temp_dir.path()).await.expect("failed to create store");
	(Arc::new(store), temp_dir)
}

#[tokio::test]
async fn test_corrupt_snapshot_file_is_treated_as_absent() {
	let (store, temp) = create_test_store().await;
	tokio::fs::write(temp.path().join("s1.snapshot"), b"definitely not a crdt update")
		.await
		.expect("write garbage");

	assert!(store.get("s1").await.expect("get").is_none());
}

#[tokio::test]
async fn test_s5_snapshot_survives_restart() {
	let (store, _temp) = create_test_store().await;

	let session = Session::spawn("s5", SessionConfig::default(), Some(store.clone())).await;
	session.write_file("/a", "hi", "A", WriteMode::Overwrite).await.expect("write");
	session.shutdown().await.expect("final snapshot");

	// Simulate a hub restart: a fresh session restores from the store.
	let restored = Session::spawn("s5", SessionConfig::default(), Some(store.clone())).await;
	let files = restored.list_files("").await.expect("list");
	assert_eq!(files.len(), 1);
	assert_eq!(files[0].0, "/a");

	let ops = restored.operations().await.expect("operations");
	assert_eq!(ops.len(), 1);
	assert_eq!(ops[0].path, "/a");
	assert!(ops[0].success);
}

#[tokio::test]
async fn test_restore_from_empty_store_starts_fresh() {
	let (store, _temp) = create_test_store().await;
	let session = Session::spawn("never-snapshotted", SessionConfig::default(), Some(store)).await;
	assert!(session.list_files("").await.expect("list").is_empty());
}
