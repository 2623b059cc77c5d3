//! The top-level framed envelope (§4.C): a leading kind byte, then a
//! payload whose shape depends on the kind. One transport message always
//! carries exactly one frame — the transport is assumed self-delimiting.

use crate::control::ControlMessage;
use crate::varint::{read_bytes, read_str, read_uvarint, write_bytes, write_str, write_uvarint};
use collabfs_types::Error;

const KIND_SYNC: u64 = 0;
const KIND_AWARENESS: u64 = 1;
const KIND_CUSTOM: u64 = 2;

const SYNC_STEP0: u64 = 0;
const SYNC_STEP1: u64 = 1;
const SYNC_STEP2: u64 = 2;

/// The sync sub-protocol (inside a kind-0 frame): a step byte then payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStep {
	/// "I have up to here — send me the rest." Payload: state-vector bytes.
	Step0(Vec<u8>),
	/// Answer to step 0: everything the asker is missing.
	Step1(Vec<u8>),
	/// A new incremental update.
	Step2(Vec<u8>),
}

/// One complete wire frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
	Sync(SyncStep),
	/// Opaque awareness bytes, relayed without being interpreted.
	Awareness(Vec<u8>),
	Custom(ControlMessage),
}

impl Frame {
	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		let mut buf = Vec::new();
		match self {
			Frame::Sync(step) => {
				write_uvarint(&mut buf, KIND_SYNC);
				match step {
					SyncStep::Step0(bytes) => {
						write_uvarint(&mut buf, SYNC_STEP0);
						write_bytes(&mut buf, bytes);
					}
					SyncStep::Step1(bytes) => {
						write_uvarint(&mut buf, SYNC_STEP1);
						write_bytes(&mut buf, bytes);
					}
					SyncStep::Step2(bytes) => {
						write_uvarint(&mut buf, SYNC_STEP2);
						write_bytes(&mut buf, bytes);
					}
				}
			}
			Frame::Awareness(bytes) => {
				write_uvarint(&mut buf, KIND_AWARENESS);
				write_bytes(&mut buf, bytes);
			}
			Frame::Custom(msg) => {
				write_uvarint(&mut buf, KIND_CUSTOM);
				write_str(&mut buf, &msg.to_json()?);
			}
		}
		Ok(buf)
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
		let mut pos = 0;
		let kind = read_uvarint(bytes, &mut pos)?;
		let frame = match kind {
			KIND_SYNC => {
				let step = read_uvarint(bytes, &mut pos)?;
				let payload = read_bytes(bytes, &mut pos)?;
				let step = match step {
					SYNC_STEP0 => SyncStep::Step0(payload),
					SYNC_STEP1 => SyncStep::Step1(payload),
					SYNC_STEP2 => SyncStep::Step2(payload),
					other => {
						return Err(Error::MalformedFrame(format!("unknown sync step {}", other)))
					}
				};
				Frame::Sync(step)
			}
			KIND_AWARENESS => Frame::Awareness(read_bytes(bytes, &mut pos)?),
			KIND_CUSTOM => {
				let payload = read_str(bytes, &mut pos)?;
				Frame::Custom(ControlMessage::from_json(&payload)?)
			}
			other => return Err(Error::MalformedFrame(format!("unknown frame kind {}", other))),
		};
		if pos != bytes.len() {
			return Err(Error::MalformedFrame("trailing bytes after frame".into()));
		}
		Ok(frame)
	}
}


// vim: ts=4
