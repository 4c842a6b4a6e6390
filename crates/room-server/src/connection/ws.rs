//! WebSocket adapter over axum's upgraded socket.

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use super::{Connection, ConnectionError, FrameSink, FrameStream, Incoming};

pub struct WsConnection {
    socket: WebSocket,
}

impl WsConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

pub struct WsSink(SplitSink<WebSocket, WsMessage>);

pub struct WsStream(SplitStream<WebSocket>);

fn transport(err: axum::Error) -> ConnectionError {
    ConnectionError::Transport(err.to_string())
}

#[async_trait]
impl Connection for WsConnection {
    type Sink = WsSink;
    type Stream = WsStream;

    fn split(self) -> (WsSink, WsStream) {
        let (sink, stream) = self.socket.split();
        (WsSink(sink), WsStream(stream))
    }

    async fn reject(mut self, reason: &str) {
        let frame = CloseFrame {
            code: close_code::POLICY,
            reason: reason.into(),
        };
        if let Err(e) = self.socket.send(WsMessage::Close(Some(frame))).await {
            tracing::debug!(error = %e, "failed to send rejection close frame");
        }
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Bytes) -> Result<(), ConnectionError> {
        // JSON frames go out as text; anything else stays binary.
        let msg = match String::from_utf8(frame.to_vec()) {
            Ok(text) => WsMessage::Text(text.into()),
            Err(_) => WsMessage::Binary(frame),
        };
        self.0.send(msg).await.map_err(transport)
    }

    async fn ping(&mut self) -> Result<(), ConnectionError> {
        self.0.send(WsMessage::Ping(Bytes::new())).await.map_err(transport)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.0.send(WsMessage::Close(None)).await.map_err(transport)?;
        self.0.close().await.map_err(transport)
    }
}

#[async_trait]
impl FrameStream for WsStream {
    async fn recv(&mut self) -> Result<Incoming, ConnectionError> {
        match self.0.next().await {
            None => Ok(Incoming::Closed),
            Some(Err(e)) => Err(transport(e)),
            Some(Ok(msg)) => Ok(match msg {
                WsMessage::Text(text) => Incoming::Frame(Bytes::copy_from_slice(text.as_str().as_bytes())),
                WsMessage::Binary(data) => Incoming::Frame(data),
                WsMessage::Ping(_) | WsMessage::Pong(_) => Incoming::Heartbeat,
                WsMessage::Close(_) => Incoming::Closed,
            }),
        }
    }
}
