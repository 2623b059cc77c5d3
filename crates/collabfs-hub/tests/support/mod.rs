//! A minimal scripted CRDT replica used to drive the hub's connection
//! lifecycle from integration tests without a real socket or a full
//! client-replica implementation (§8 "Test placement": in-memory `Transport`
//! pair).

use collabfs_codec::control::{ActivityUpdateData, ActivityWire, ParticipantData};
use collabfs_codec::{ControlMessage, Frame, SyncStep};
use collabfs_crdt::{Document, Origin};
use collabfs_hub::transport::testing::{channel_pair, ChannelSink, ChannelSource};
use collabfs_hub::transport::{FrameSink, FrameSource, Transport};
use collabfs_hub::Hub;
use std::sync::Arc;

pub struct VirtualClient {
	pub document: Document,
	sink: ChannelSink,
	source: ChannelSource,
}

impl VirtualClient {
	/// Spawns a connection task against `hub`, sends `join`, exchanges state
	/// vectors both ways, and returns once both the `joined` ack and the
	/// full two-way sync handshake have completed.
	pub async fn join(hub: &Arc<Hub>, user_id: &str, session_id: &str) -> Self {
		let (client_end, hub_end) = channel_pair(32);
		let hub = hub.clone();
		tokio::spawn(async move {
			collabfs_hub::run_connection(&hub, hub_end).await;
		});
		let (sink, source) = client_end.split();
		let mut client = Self { document: Document::new(), sink, source };

		client
			.sink
			.send(Frame::Custom(ControlMessage::Join {
				user_id: user_id.to_string(),
				session_id: session_id.to_string(),
			}))
			.await
			.expect("send join");
		let sv = client.document.state_vector();
		client.sink.send(Frame::Sync(SyncStep::Step0(sv))).await.expect("send own step0");

		let mut got_joined = false;
		let mut answered_hub_request = false;
		let mut got_hub_answer = false;
		while !(got_joined && answered_hub_request && got_hub_answer) {
			let frame = client.recv().await.expect("handshake frame");
			match frame {
				Frame::Custom(ControlMessage::Joined { .. }) => got_joined = true,
				Frame::Sync(SyncStep::Step0(hub_sv)) => {
					let diff = client.document.encode_as_update(Some(&hub_sv)).expect("diff");
					client.sink.send(Frame::Sync(SyncStep::Step1(diff))).await.expect("send step1");
					answered_hub_request = true;
				}
				Frame::Sync(SyncStep::Step1(bytes)) => {
					client.document.apply_update(&bytes, Origin::Hub).expect("apply");
					got_hub_answer = true;
				}
				other => panic!("unexpected frame during handshake: {other:?}"),
			}
		}
		client
	}

	/// Reads the next frame, with no handshake-specific interpretation.
	pub async fn recv(&mut self) -> Option<Frame> {
		self.source.recv().await.expect("transport recv")
	}

	/// Waits for the next `Sync(Step2)` frame, applying it as a hub-origin
	/// update and ignoring anything else (presence chatter, etc.) in between.
	pub async fn recv_update(&mut self) -> Vec<u8> {
		loop {
			match self.recv().await.expect("connection closed while waiting for update") {
				Frame::Sync(SyncStep::Step2(bytes)) => {
					self.document.apply_update(&bytes, Origin::Hub).expect("apply");
					return bytes;
				}
				_ => continue,
			}
		}
	}

	pub async fn recv_participant_joined(&mut self) -> String {
		loop {
			if let Frame::Custom(ControlMessage::ParticipantJoined { data: ParticipantData { user_id } }) =
				self.recv().await.expect("connection closed")
			{
				return user_id;
			}
		}
	}

	pub async fn recv_participant_left(&mut self) -> String {
		loop {
			if let Frame::Custom(ControlMessage::ParticipantLeft { data: ParticipantData { user_id } }) =
				self.recv().await.expect("connection closed")
			{
				return user_id;
			}
		}
	}

	pub async fn recv_activity_update(&mut self) -> (String, ActivityWire) {
		loop {
			if let Frame::Custom(ControlMessage::ActivityUpdate {
				data: ActivityUpdateData { user_id, activity },
			}) = self.recv().await.expect("connection closed")
			{
				return (user_id, activity);
			}
		}
	}

	/// Performs one local transaction and pushes the resulting update to the
	/// hub as a `sync step 2` frame, mirroring the origin-filtered listener
	/// §4.E describes for a real client replica.
	pub async fn write_and_push(&mut self, path: &str, content: &str) {
		let sv_before = self.document.state_vector();
		self.document.transact(Origin::Local, |txn, doc| {
			doc.overwrite_text(txn, path, content);
		});
		let update = self.document.encode_as_update(Some(&sv_before)).expect("encode");
		self.sink.send(Frame::Sync(SyncStep::Step2(update))).await.expect("send step2");
	}

	/// Same as [`Self::write_and_push`], but a character-level insert at
	/// `index` rather than a whole-file replace — the vehicle for driving
	/// two replicas into the same-path, same-index text race (§8 S2).
	pub async fn insert_and_push(&mut self, path: &str, index: u32, content: &str) {
		let sv_before = self.document.state_vector();
		self.document.transact(Origin::Local, |txn, doc| {
			doc.insert_text(txn, path, index, content);
		});
		let update = self.document.encode_as_update(Some(&sv_before)).expect("encode");
		self.sink.send(Frame::Sync(SyncStep::Step2(update))).await.expect("send step2");
	}

	pub async fn send_leave(&mut self, user_id: &str, session_id: &str) {
		self.sink
			.send(Frame::Custom(ControlMessage::Leave {
				user_id: user_id.to_string(),
				session_id: session_id.to_string(),
			}))
			.await
			.expect("send leave");
	}

	pub async fn send_activity(&mut self, user_id: &str, session_id: &str, action: &str, current_file: Option<&str>) {
		self.sink
			.send(Frame::Custom(ControlMessage::UpdateActivity {
				user_id: user_id.to_string(),
				session_id: session_id.to_string(),
				activity: ActivityWire { action: action.to_string(), current_file: current_file.map(str::to_string) },
			}))
			.await
			.expect("send update_activity");
	}

	pub fn drop_connection(self) {
		drop(self);
	}
}
