//! `Connector`/`Transport` over a real WebSocket, using `tokio-tungstenite`
//! the way `diaryx-org-diaryx-core`'s `WebSocketSyncProvider`
//! (`apps/tauri/src-tauri/src/sync/websocket_provider.rs`) does: `connect_async`,
//! split into a `SplitSink`/`SplitStream`, binary messages carry the framed
//! payload.

use async_trait::async_trait;
use collabfs_hub::transport::{FrameSink, FrameSource, Transport};
use collabfs_codec::Frame;
use collabfs_types::{ClResult, Error};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::connector::Connector;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsSink(SplitSink<WsStream, Message>);

#[async_trait]
impl FrameSink for WsSink {
	async fn send(&mut self, frame: Frame) -> ClResult<()> {
		let bytes = frame.encode()?;
		self.0
			.send(Message::Binary(bytes.into()))
			.await
			.map_err(|e| Error::Internal(format!("websocket send failed: {e}")))
	}
}

pub struct WsSource(SplitStream<WsStream>);

#[async_trait]
impl FrameSource for WsSource {
	async fn recv(&mut self) -> ClResult<Option<Frame>> {
		loop {
			let Some(msg) = self.0.next().await else { return Ok(None) };
			let msg = msg.map_err(|e| Error::Internal(format!("websocket recv failed: {e}")))?;
			match msg {
				Message::Binary(bytes) => return Ok(Some(Frame::decode(&bytes)?)),
				Message::Close(_) => return Ok(None),
				// Ping/Pong/Text/raw Frame carry no collabfs frame; tungstenite
				// answers pings automatically.
				_ => continue,
			}
		}
	}
}

pub struct WsTransport(WsStream);

impl Transport for WsTransport {
	type Sink = WsSink;
	type Source = WsSource;

	fn split(self) -> (Self::Sink, Self::Source) {
		let (tx, rx) = self.0.split();
		(WsSink(tx), WsSource(rx))
	}
}

/// Opens a fresh connection to `url` on every `connect()` call — the reconnect
/// loop in [`crate::client`] calls this once per attempt.
pub struct WsConnector {
	url: String,
}

impl WsConnector {
	pub fn new(url: impl Into<String>) -> Self {
		Self { url: url.into() }
	}
}

#[async_trait]
impl Connector for WsConnector {
	type Transport = WsTransport;

	async fn connect(&self) -> ClResult<Self::Transport> {
		let (stream, _response) = connect_async(&self.url)
			.await
			.map_err(|e| Error::Internal(format!("websocket connect to {} failed: {e}", self.url)))?;
		Ok(WsTransport(stream))
	}
}

// vim: ts=4
