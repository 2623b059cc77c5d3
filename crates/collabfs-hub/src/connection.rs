//! Per-connection lifecycle (§4.D): join handshake, sync/awareness relay,
//! activity/heartbeat handling, and leave/close teardown. Written against
//! [`Transport`] so it runs unchanged over a real socket or an in-memory
//! pair (§4.D expansion).

use collabfs_codec::control::{
	ActivityUpdateData, ActivityWire, JoinedData, JoinedStats, ParticipantData, StructuralAckData,
	WriteAckData,
};
use collabfs_codec::{ControlMessage, Frame, SyncStep};
use collabfs_crdt::Origin;
use collabfs_session::StructuralResult;
use collabfs_types::model::{ActivityAction, ActivityPatch};
use collabfs_types::utils::random_id;
use collabfs_types::{ClResult, Error};
use tracing::{info, warn};

use crate::hub::{Hub, HubSession};
use crate::transport::{FrameSink, FrameSource, Transport};

/// Drives one connection end-to-end until the peer disconnects, sends
/// `leave`, or goes idle past the hub's timeout. Consumes the transport; the
/// hub keeps no reference to it once this returns.
pub async fn run_connection<T: Transport>(hub: &Hub, transport: T) {
	let conn_id = random_id();
	let (mut sink, mut source) = transport.split();

	let (session_id, user_id) = match await_join(&conn_id, &mut sink, &mut source).await {
		Some(pair) => pair,
		None => return,
	};

	let joined = hub.join(&session_id, &conn_id).await;
	let hub_session = joined.hub_session;
	let mut outbound_rx = joined.outbound_rx;

	if let Err(err) = hub_session.session().add_participant(user_id.clone()).await {
		warn!("connection {}: failed to add participant: {}", conn_id, err);
		return;
	}
	info!("connection {}: {} joined session {}", conn_id, user_id, session_id);

	if send_joined_and_initial_sync(&hub_session, &mut sink, &session_id).await.is_err() {
		hub.leave(&session_id, &hub_session, &conn_id).await;
		return;
	}

	hub.fan_out(
		&hub_session,
		&conn_id,
		Frame::Custom(ControlMessage::ParticipantJoined {
			data: ParticipantData { user_id: user_id.clone() },
		}),
	)
	.await;

	let idle_timeout = hub.config().idle_timeout;
	let mut idle_deadline = tokio::time::Instant::now() + idle_timeout;
	loop {
		tokio::select! {
			frame = source.recv() => {
				match frame {
					Ok(Some(frame)) => {
						idle_deadline = tokio::time::Instant::now() + idle_timeout;
						if !handle_inbound(hub, &hub_session, &conn_id, &user_id, frame, &mut sink).await {
							break;
						}
					}
					Ok(None) => break,
					Err(err) => {
						warn!("connection {}: malformed frame, closing: {}", conn_id, err);
						break;
					}
				}
			}
			outbound = outbound_rx.recv() => {
				match outbound {
					Some(frame) => {
						if sink.send(frame).await.is_err() {
							break;
						}
					}
					None => break,
				}
			}
			() = tokio::time::sleep_until(idle_deadline) => {
				info!("connection {}: idle timeout, evicting", conn_id);
				break;
			}
		}
	}

	let _ = hub_session.session().remove_participant(user_id.clone()).await;
	hub.fan_out(
		&hub_session,
		&conn_id,
		Frame::Custom(ControlMessage::ParticipantLeft { data: ParticipantData { user_id: user_id.clone() } }),
	)
	.await;
	hub.leave(&session_id, &hub_session, &conn_id).await;
	info!("connection {}: {} left session {}", conn_id, user_id, session_id);
}

/// Reads frames until `join` arrives (§4.D step 2). Any other frame before
/// `join` is `UnknownSession` (§7) and closes the stream; a clean close
/// before joining is silently not an error.
async fn await_join<K: FrameSink, R: FrameSource>(
	conn_id: &str,
	sink: &mut K,
	source: &mut R,
) -> Option<(String, String)> {
	match source.recv().await {
		Ok(Some(Frame::Custom(ControlMessage::Join { user_id, session_id }))) => {
			Some((session_id, user_id))
		}
		Ok(Some(_other)) => {
			warn!("connection {}: frame before join, closing", conn_id);
			let _ = sink.send(Frame::Custom(ControlMessage::Error { error: Error::UnknownSession.to_string() })).await;
			None
		}
		Ok(None) => None,
		Err(err) => {
			warn!("connection {}: {}", conn_id, err);
			None
		}
	}
}

async fn send_joined_and_initial_sync<K: FrameSink>(
	hub_session: &HubSession,
	sink: &mut K,
	session_id: &str,
) -> ClResult<()> {
	let stats = hub_session.session().stats().await?;
	sink.send(Frame::Custom(ControlMessage::Joined {
		data: JoinedData {
			session_id: session_id.to_string(),
			stats: JoinedStats {
				participant_count: stats.participant_count,
				file_count: stats.file_count,
				op_count: stats.op_count,
			},
		},
	}))
	.await?;
	let state_vector = hub_session.session().state_vector().await?;
	sink.send(Frame::Sync(SyncStep::Step0(state_vector))).await?;
	Ok(())
}

/// Sends the CRDT delta produced by a structural/write mutation to the
/// requester first, then fans it out to every other peer (§4.B/§4.D): the
/// requester must have applied its own delta before its ack arrives, or a
/// `read_file` right after the ack would still observe stale content.
async fn relay_structural_delta<K: FrameSink>(
	hub: &Hub,
	hub_session: &HubSession,
	conn_id: &str,
	sink: &mut K,
	before: Vec<u8>,
) -> ClResult<()> {
	let delta = hub_session.session().encode_as_update(Some(before)).await?;
	sink.send(Frame::Sync(SyncStep::Step2(delta.clone()))).await?;
	hub.fan_out(hub_session, conn_id, Frame::Sync(SyncStep::Step2(delta))).await;
	Ok(())
}

/// Returns `false` when the connection should end (peer sent `leave`).
async fn handle_inbound<K: FrameSink>(
	hub: &Hub,
	hub_session: &HubSession,
	conn_id: &str,
	user_id: &str,
	frame: Frame,
	sink: &mut K,
) -> bool {
	match frame {
		Frame::Sync(SyncStep::Step0(remote_vector)) => {
			match hub_session.session().encode_as_update(Some(remote_vector)).await {
				Ok(bytes) => {
					if sink.send(Frame::Sync(SyncStep::Step1(bytes))).await.is_err() {
						return false;
					}
				}
				Err(err) => warn!("connection {}: failed to diff state vector: {}", conn_id, err),
			}
			true
		}
		Frame::Sync(SyncStep::Step1(bytes)) | Frame::Sync(SyncStep::Step2(bytes)) => {
			if let Err(err) = hub_session.session().apply_update(bytes.clone(), Origin::Hub).await {
				// A single peer's bad update never tears down the session (§7).
				warn!("connection {}: rejected update: {}", conn_id, err);
				return true;
			}
			hub.fan_out(hub_session, conn_id, Frame::Sync(SyncStep::Step2(bytes))).await;
			true
		}
		Frame::Awareness(bytes) => {
			hub.fan_out(hub_session, conn_id, Frame::Awareness(bytes)).await;
			true
		}
		Frame::Custom(ControlMessage::UpdateActivity { activity, .. }) => {
			let action = ActivityAction::parse(&activity.action).unwrap_or(ActivityAction::Idle);
			let patch =
				ActivityPatch { current_file: Some(activity.current_file.clone()), action: Some(action) };
			match hub_session.session().update_activity(user_id, patch).await {
				Ok(updated) => {
					hub.fan_out(
						hub_session,
						conn_id,
						Frame::Custom(ControlMessage::ActivityUpdate {
							data: ActivityUpdateData {
								user_id: user_id.to_string(),
								activity: ActivityWire {
									action: updated.action.as_str().to_string(),
									current_file: updated.current_file,
								},
							},
						}),
					)
					.await;
				}
				Err(err) => warn!("connection {}: update_activity failed: {}", conn_id, err),
			}
			true
		}
		Frame::Custom(ControlMessage::Heartbeat { .. }) => {
			let patch = ActivityPatch { current_file: None, action: Some(ActivityAction::Idle) };
			let _ = hub_session.session().update_activity(user_id, patch).await;
			true
		}
		Frame::Custom(ControlMessage::Leave { .. }) => false,
		Frame::Custom(ControlMessage::Join { .. }) => {
			warn!("connection {}: duplicate join ignored", conn_id);
			true
		}
		Frame::Custom(ControlMessage::WriteFile { path, content, mode, .. }) => {
			let before = match hub_session.session().state_vector().await {
				Ok(before) => before,
				Err(err) => {
					warn!("connection {}: write_file failed: {}", conn_id, err);
					return true;
				}
			};
			let token = match hub_session.session().write_file(path.clone(), content, user_id, mode).await {
				Ok(token) => token,
				Err(err) => {
					warn!("connection {}: write_file failed: {}", conn_id, err);
					return true;
				}
			};
			if relay_structural_delta(hub, hub_session, conn_id, sink, before).await.is_err() {
				return false;
			}
			if sink
				.send(Frame::Custom(ControlMessage::WriteAck { data: WriteAckData { path, token } }))
				.await
				.is_err()
			{
				return false;
			}
			true
		}
		Frame::Custom(ControlMessage::MoveFile { old_path, new_path, .. }) => {
			let before = match hub_session.session().state_vector().await {
				Ok(before) => before,
				Err(err) => {
					warn!("connection {}: move_file failed: {}", conn_id, err);
					return true;
				}
			};
			let StructuralResult { success, token, error } =
				match hub_session.session().move_file(old_path.clone(), new_path.clone(), user_id).await {
					Ok(result) => result,
					Err(err) => {
						warn!("connection {}: move_file failed: {}", conn_id, err);
						return true;
					}
				};
			if relay_structural_delta(hub, hub_session, conn_id, sink, before).await.is_err() {
				return false;
			}
			let data = StructuralAckData { path: old_path, new_path: Some(new_path), success, token, error };
			if sink.send(Frame::Custom(ControlMessage::StructuralAck { data })).await.is_err() {
				return false;
			}
			true
		}
		Frame::Custom(ControlMessage::DeleteFile { path, .. }) => {
			let before = match hub_session.session().state_vector().await {
				Ok(before) => before,
				Err(err) => {
					warn!("connection {}: delete_file failed: {}", conn_id, err);
					return true;
				}
			};
			let StructuralResult { success, token, error } =
				match hub_session.session().delete_file(path.clone(), user_id).await {
					Ok(result) => result,
					Err(err) => {
						warn!("connection {}: delete_file failed: {}", conn_id, err);
						return true;
					}
				};
			if relay_structural_delta(hub, hub_session, conn_id, sink, before).await.is_err() {
				return false;
			}
			let data = StructuralAckData { path, new_path: None, success, token, error };
			if sink.send(Frame::Custom(ControlMessage::StructuralAck { data })).await.is_err() {
				return false;
			}
			true
		}
		Frame::Custom(other) => {
			warn!("connection {}: unexpected custom frame on established session: {:?}", conn_id, other);
			true
		}
	}
}

// vim: ts=4
