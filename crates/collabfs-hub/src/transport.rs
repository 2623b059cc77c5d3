//! Transport abstraction (§4.D expansion): the connection-lifecycle state
//! machine is written against this trait rather than directly against
//! `axum::extract::ws`, so join/leave/heartbeat/broadcast/backpressure are
//! unit-testable with in-memory paired channels. `axum_ws` supplies the real
//! adapter; `testing` supplies the in-memory pair used by this crate's own
//! tests and by `collabfs-client`'s.

use async_trait::async_trait;
use collabfs_codec::Frame;
use collabfs_types::ClResult;

/// The sending half of a connection: mirrors `futures::stream::SplitSink`
/// over a real socket, but over `Frame` instead of raw bytes.
#[async_trait]
pub trait FrameSink: Send {
	async fn send(&mut self, frame: Frame) -> ClResult<()>;
}

/// The receiving half: `None` signals a clean close, `Err` a transport
/// fault — both end the connection's read loop.
#[async_trait]
pub trait FrameSource: Send {
	async fn recv(&mut self) -> ClResult<Option<Frame>>;
}

/// A bidirectional stream that can be split into independently-owned
/// sink/source halves, letting the connection loop read and write
/// concurrently (§5: network I/O is a suspension point, never the
/// transaction itself).
pub trait Transport: Send {
	type Sink: FrameSink + 'static;
	type Source: FrameSource + 'static;

	fn split(self) -> (Self::Sink, Self::Source);
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
	//! An in-memory `Transport` pair with no real socket, used to unit-test
	//! the connection lifecycle and, from `collabfs-client`, scenarios S2/S4
	//! and invariant 6 (§8 "Test placement").

	use super::*;
	use tokio::sync::mpsc;

	pub struct ChannelSink(mpsc::Sender<Frame>);

	#[async_trait]
	impl FrameSink for ChannelSink {
		async fn send(&mut self, frame: Frame) -> ClResult<()> {
			self.0.send(frame).await.map_err(|_| collabfs_types::Error::Internal("peer gone".into()))
		}
	}

	pub struct ChannelSource(mpsc::Receiver<Frame>);

	#[async_trait]
	impl FrameSource for ChannelSource {
		async fn recv(&mut self) -> ClResult<Option<Frame>> {
			Ok(self.0.recv().await)
		}
	}

	pub struct ChannelTransport {
		tx: mpsc::Sender<Frame>,
		rx: mpsc::Receiver<Frame>,
	}

	impl Transport for ChannelTransport {
		type Sink = ChannelSink;
		type Source = ChannelSource;

		fn split(self) -> (Self::Sink, Self::Source) {
			(ChannelSink(self.tx), ChannelSource(self.rx))
		}
	}

	/// Builds two ends of an in-memory duplex: frames sent into one end's
	/// sink arrive at the other end's source.
	pub fn channel_pair(capacity: usize) -> (ChannelTransport, ChannelTransport) {
		let (a_tx, b_rx) = mpsc::channel(capacity);
		let (b_tx, a_rx) = mpsc::channel(capacity);
		(ChannelTransport { tx: a_tx, rx: a_rx }, ChannelTransport { tx: b_tx, rx: b_rx })
	}
}

// vim: ts=4
