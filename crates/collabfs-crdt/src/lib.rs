//! The shared CRDT document used by a single collaborative session.
//!
//! This crate is intentionally narrow: it owns a `yrs::Doc` and exposes a
//! small surface (`state_vector`, `encode_as_update`, `apply_update`,
//! `transact`) plus typed accessors for the four containers. It knows
//! nothing about sessions, participants, or the wire format — those live in
//! `collabfs-session` and `collabfs-codec`.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod document;
mod error;

pub use document::{DocUpdate, Document, Origin};
pub use error::Error;

#[cfg(test)]
mod tests {
	use super::*;
	use collabfs_types::model::{Activity, ActivityAction, FileMeta, Operation, OperationKind};

	fn sample_meta(token: i64) -> FileMeta {
		FileMeta {
			last_modified_ms: 1000,
			last_modified_by: "alice".into(),
			token,
			size_bytes: 0,
			is_binary: false,
		}
	}

	#[test]
	fn state_vector_round_trips_through_apply_update() {
		let a = Document::new();
		a.transact(Origin::Local, |txn, doc| {
			doc.overwrite_text(txn, "notes.txt", "hello");
			doc.set_file_meta(txn, "notes.txt", &sample_meta(1));
		});

		let b = Document::new();
		let sv_b = b.state_vector();
		let diff = a.encode_as_update(Some(&sv_b)).expect("encode should succeed");
		b.apply_update(&diff, Origin::Hub).expect("apply should succeed");

		assert_eq!(b.text("notes.txt").as_deref(), Some("hello"));
		assert_eq!(b.file_meta("notes.txt"), a.file_meta("notes.txt"));
	}

	#[test]
	fn apply_update_is_idempotent() {
		let a = Document::new();
		a.transact(Origin::Local, |txn, doc| {
			doc.overwrite_text(txn, "a.txt", "one");
		});
		let b = Document::new();
		let diff = a.encode_as_update(None).expect("encode should succeed");
		b.apply_update(&diff, Origin::Hub).expect("first apply");
		b.apply_update(&diff, Origin::Hub).expect("second apply should be a no-op");
		assert_eq!(b.text("a.txt").as_deref(), Some("one"));
	}

	#[test]
	fn concurrent_edits_converge() {
		let a = Document::new();
		let b = Document::new();

		a.transact(Origin::Local, |txn, doc| {
			doc.overwrite_text(txn, "shared.txt", "base");
		});
		let seed = a.encode_as_update(None).expect("encode");
		b.apply_update(&seed, Origin::Hub).expect("seed apply");

		let sv_a = a.state_vector();
		let sv_b = b.state_vector();

		a.transact(Origin::Local, |txn, doc| {
			doc.set_file_meta(txn, "shared.txt", &sample_meta(5));
		});
		b.transact(Origin::Local, |txn, doc| {
			doc.set_file_meta(txn, "other.txt", &sample_meta(6));
		});

		let a_to_b = a.encode_as_update(Some(&sv_b)).expect("encode a");
		let b_to_a = b.encode_as_update(Some(&sv_a)).expect("encode b");
		b.apply_update(&a_to_b, Origin::Hub).expect("b applies a");
		a.apply_update(&b_to_a, Origin::Hub).expect("a applies b");

		assert_eq!(a.file_meta("shared.txt"), b.file_meta("shared.txt"));
		assert_eq!(a.file_meta("other.txt"), b.file_meta("other.txt"));
		assert_eq!(a.state_vector(), b.state_vector());
	}

	#[test]
	fn op_log_is_append_only_and_ordered() {
		let doc = Document::new();
		doc.transact(Origin::Local, |txn, d| {
			d.push_operation(
				txn,
				&Operation {
					token: 1,
					kind: OperationKind::Create,
					path: "a.txt".into(),
					new_path: None,
					by: "alice".into(),
					timestamp_ms: 1,
					success: true,
					error: None,
				},
			);
		});
		doc.transact(Origin::Local, |txn, d| {
			d.push_operation(
				txn,
				&Operation {
					token: 2,
					kind: OperationKind::Delete,
					path: "a.txt".into(),
					new_path: None,
					by: "bob".into(),
					timestamp_ms: 2,
					success: false,
					error: Some("not found".into()),
				},
			);
		});

		let ops = doc.operations();
		assert_eq!(ops.len(), 2);
		assert_eq!(doc.operation_count(), 2);
		assert_eq!(ops[0].token, 1);
		assert_eq!(ops[1].token, 2);
		assert!(!ops[1].success);
	}

	#[test]
	fn transact_emits_single_notification_for_multi_field_change() {
		let doc = Document::new();
		let mut rx = doc.subscribe();
		doc.transact(Origin::Local, |txn, d| {
			d.overwrite_text(txn, "f.txt", "v1");
			d.set_file_meta(txn, "f.txt", &sample_meta(1));
		});
		let update = rx.try_recv().expect("one notification");
		assert_eq!(update.origin, Origin::Local);
		assert!(rx.try_recv().is_err(), "no second notification for one transaction");
	}

	#[test]
	fn activity_set_and_remove_round_trip() {
		let doc = Document::new();
		doc.transact(Origin::Local, |txn, d| {
			d.set_activity(
				txn,
				&Activity {
					user_id: "alice".into(),
					current_file: Some("a.txt".into()),
					action: ActivityAction::Editing,
					timestamp_ms: 10,
				},
			);
		});
		assert!(doc.activity_for("alice").is_some());
		assert_eq!(doc.all_activity().len(), 1);

		doc.transact(Origin::Local, |txn, d| {
			d.remove_activity(txn, "alice");
		});
		assert!(doc.activity_for("alice").is_none());
		assert_eq!(doc.all_activity().len(), 0);
	}

	#[test]
	fn move_file_copies_then_source_is_removed() {
		let doc = Document::new();
		doc.transact(Origin::Local, |txn, d| {
			d.overwrite_text(txn, "old.txt", "payload");
			d.set_file_meta(txn, "old.txt", &sample_meta(1));
		});
		doc.transact(Origin::Local, |txn, d| {
			d.copy_text(txn, "old.txt", "new.txt");
			d.set_file_meta(txn, "new.txt", &sample_meta(2));
			d.remove_text(txn, "old.txt");
			d.remove_file_meta(txn, "old.txt");
		});

		assert_eq!(doc.text("new.txt").as_deref(), Some("payload"));
		assert!(doc.text("old.txt").is_none());
		assert!(!doc.has_file("old.txt"));
		assert!(doc.has_file("new.txt"));
	}

	#[test]
	fn list_files_filters_by_prefix() {
		let doc = Document::new();
		doc.transact(Origin::Local, |txn, d| {
			d.set_file_meta(txn, "src/a.rs", &sample_meta(1));
			d.set_file_meta(txn, "src/b.rs", &sample_meta(2));
			d.set_file_meta(txn, "docs/readme.md", &sample_meta(3));
		});
		let src_files = doc.list_files("src/");
		assert_eq!(src_files.len(), 2);
		let all_files = doc.list_files("");
		assert_eq!(all_files.len(), 3);
	}
}

// vim: ts=4
