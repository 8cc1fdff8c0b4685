//! Duplex message transport consumed by client sessions.
//!
//! [`Transport`] is the seam between a [`super::Client`] and a physical
//! connection. Deadlines are enforced by the session with
//! `tokio::time::timeout`, and liveness pongs surface as [`Frame::Pong`]
//! from [`Transport::read_frame`], so implementations only need to move
//! frames and support an out-of-band [`Transport::close`].

use std::fmt;

use async_trait::async_trait;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 data frame.
    Text(Utf8Bytes),
    /// Binary data frame.
    Binary(Bytes),
    /// Liveness check.
    Ping(Bytes),
    /// Liveness reply.
    Pong(Bytes),
    /// Peer-initiated close.
    Close,
}

impl Frame {
    /// Wraps an outbound payload: text if it is valid UTF-8, binary otherwise.
    ///
    /// Both variants share the payload's buffer, so one broadcast costs no
    /// copy per session.
    #[must_use]
    pub fn from_payload(payload: Bytes) -> Self {
        match Utf8Bytes::try_from(payload.clone()) {
            Ok(text) => Self::Text(text),
            Err(_) => Self::Binary(payload),
        }
    }
}

/// Message-oriented duplex connection.
///
/// Reads and writes may run concurrently from different tasks.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Blocks until the next frame arrives.
    ///
    /// # Errors
    ///
    /// Any error means the connection is dead; callers never retry.
    async fn read_frame(&self) -> Result<Frame, TransportError>;

    /// Writes one frame.
    ///
    /// # Errors
    ///
    /// Any error means the connection is dead; callers never retry.
    async fn write_frame(&self, frame: Frame) -> Result<(), TransportError>;

    /// Releases the connection. Pending and future reads fail promptly.
    fn close(&self);
}

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transport")
    }
}

/// [`Transport`] over an axum WebSocket.
pub struct WsTransport {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    closed: CancellationToken,
}

impl fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsTransport")
            .field("closed", &self.closed.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl WsTransport {
    /// Splits `socket` into independently lockable read and write halves.
    #[must_use]
    pub fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn read_frame(&self) -> Result<Frame, TransportError> {
        let mut stream = self.stream.lock().await;
        let next = tokio::select! {
            biased;
            () = self.closed.cancelled() => return Err(TransportError::Closed),
            next = stream.next() => next,
        };
        match next {
            Some(Ok(Message::Text(text))) => Ok(Frame::Text(text)),
            Some(Ok(Message::Binary(data))) => Ok(Frame::Binary(data)),
            Some(Ok(Message::Ping(data))) => Ok(Frame::Ping(data)),
            Some(Ok(Message::Pong(data))) => Ok(Frame::Pong(data)),
            Some(Ok(Message::Close(_))) => Ok(Frame::Close),
            Some(Err(err)) => Err(TransportError::Io(err.to_string())),
            None => Err(TransportError::Closed),
        }
    }

    async fn write_frame(&self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Ping(data) => Message::Ping(data),
            Frame::Pong(data) => Message::Pong(data),
            Frame::Close => Message::Close(None),
        };
        let mut sink = self.sink.lock().await;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(TransportError::Closed),
            sent = sink.send(message) => sent.map_err(|err| TransportError::Io(err.to_string())),
        }
    }

    fn close(&self) {
        self.closed.cancel();
    }
}


#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn utf8_payload_becomes_text() {
        let frame = Frame::from_payload(Bytes::from_static(b"{\"type\":\"report.created\"}"));
        assert_eq!(
            frame,
            Frame::Text(Utf8Bytes::from_static("{\"type\":\"report.created\"}"))
        );
    }

    #[test]
    fn text_frame_shares_the_payload_buffer() {
        let payload = Bytes::from(String::from("{\"type\":\"report.created\"}"));
        let Frame::Text(text) = Frame::from_payload(payload.clone()) else {
            panic!("utf-8 payload did not become text");
        };
        assert_eq!(text.as_str().as_ptr(), payload.as_ptr());
    }

    #[test]
    fn non_utf8_payload_stays_binary() {
        let raw = Bytes::from_static(&[0xff, 0xfe, 0x00]);
        assert_eq!(Frame::from_payload(raw.clone()), Frame::Binary(raw));
    }
}
