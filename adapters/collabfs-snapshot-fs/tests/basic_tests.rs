//! Basic snapshot store operations: put, get, missing session, isolation
//! between sessions sharing one base directory.

use collabfs_snapshot_fs::SnapshotStoreFs;
use collabfs_session::SnapshotStore;
use tempfile::TempDir;

async fn create_test_store() -> (SnapshotStoreFs, TempDir) {
	let temp_dir = TempDir::new().expect("failed to create temp directory");
	let store = SnapshotStoreFs::new(temp_dir.path()).await.expect("failed to create store");
	(store, temp_dir)
}

fn fake_snapshot(text: &str) -> Vec<u8> {
	let doc = collabfs_crdt::Document::new();
	doc.transact(collabfs_crdt::Origin::Local, |txn, d| {
		d.overwrite_text(txn, "/a.txt", text);
	});
	doc.encode_as_update(None).expect("encode")
}

#[tokio::test]
async fn test_get_missing_session_is_none() {
	let (store, _temp) = create_test_store().await;
	assert!(store.get("unknown-session").await.expect("get").is_none());
}

#[tokio::test]
async fn test_put_then_get_round_trips() {
	let (store, _temp) = create_test_store().await;
	let bytes = fake_snapshot("hello");
	store.put("s1", &bytes).await.expect("put");
	assert_eq!(store.get("s1").await.expect("get"), Some(bytes));
}

#[tokio::test]
async fn test_sessions_do_not_collide() {
	let (store, _temp) = create_test_store().await;
	let a = fake_snapshot("from a");
	let b = fake_snapshot("from b");
	store.put("session-a", &a).await.expect("put a");
	store.put("session-b", &b).await.expect("put b");

	assert_eq!(store.get("session-a").await.expect("get a"), Some(a));
	assert_eq!(store.get("session-b").await.expect("get b"), Some(b));
}

#[tokio::test]
async fn test_put_is_idempotent_for_identical_bytes() {
	let (store, _temp) = create_test_store().await;
	let bytes = fake_snapshot("stable");
	store.put("s1", &bytes).await.expect("first put");
	store.put("s1", &bytes).await.expect("second put");
	assert_eq!(store.get("s1").await.expect("get"), Some(bytes));
}
