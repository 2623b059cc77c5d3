//! `Transport` over a real `axum::extract::ws::WebSocket` (§4.D). Frames are
//! carried as binary messages; constructing the surrounding `axum::Router`
//! or HTTP listener is out of scope (§1) — this module stops at adapting one
//! already-upgraded socket.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use collabfs_codec::Frame;
use collabfs_types::{ClResult, Error};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use crate::transport::{FrameSink, FrameSource, Transport};

pub struct AxumWsSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSink for AxumWsSink {
	async fn send(&mut self, frame: Frame) -> ClResult<()> {
		let bytes = frame.encode()?;
		self.0
			.send(Message::Binary(bytes.into()))
			.await
			.map_err(|e| Error::Internal(format!("websocket send failed: {e}")))
	}
}

pub struct AxumWsSource(SplitStream<WebSocket>);

#[async_trait]
impl FrameSource for AxumWsSource {
	async fn recv(&mut self) -> ClResult<Option<Frame>> {
		loop {
			let Some(msg) = self.0.next().await else { return Ok(None) };
			let msg = msg.map_err(|e| Error::Internal(format!("websocket recv failed: {e}")))?;
			match msg {
				Message::Binary(bytes) => return Ok(Some(Frame::decode(&bytes)?)),
				Message::Close(_) => return Ok(None),
				// Ping/Pong/Text carry no frame; axum answers pings automatically.
				Message::Ping(_) | Message::Pong(_) | Message::Text(_) => continue,
			}
		}
	}
}

pub struct AxumWsTransport(pub WebSocket);

impl Transport for AxumWsTransport {
	type Sink = AxumWsSink;
	type Source = AxumWsSource;

	fn split(self) -> (Self::Sink, Self::Source) {
		let (tx, rx) = self.0.split();
		(AxumWsSink(tx), AxumWsSource(rx))
	}
}

// vim: ts=4
