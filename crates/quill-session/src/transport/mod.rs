//! Streaming transport seam
//!
//! The coordinator consumes backend events through [`EventSource`]: subscribing
//! yields a stream of raw frames (one JSON event per frame). A stream error or
//! a stream that ends without a terminal event is a transport failure and
//! hands the session over to recovery polling.
//!
//! Dropping a [`FrameStream`] unsubscribes.

pub mod sse;

use crate::error::TransportError;
use crate::types::SessionId;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub use sse::{sse_frames, SseDecoder};

/// Stream of raw event frames
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Source of backend event streams
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open the event stream of a session
    async fn subscribe(&self, session_id: &SessionId) -> Result<FrameStream, TransportError>;
}

/// In-process event source fed through a channel
///
/// Frames sent on the paired sender are delivered in order. Dropping every
/// sender ends the stream; the receiver can be subscribed once.
#[derive(Debug)]
pub struct ChannelEventSource {
    receiver: Mutex<Option<mpsc::Receiver<Result<String, TransportError>>>>,
}

impl ChannelEventSource {
    /// Create source and its sender
    #[must_use]
    pub fn new(capacity: usize) -> (mpsc::Sender<Result<String, TransportError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                receiver: Mutex::new(Some(rx)),
            },
        )
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn subscribe(&self, session_id: &SessionId) -> Result<FrameStream, TransportError> {
        let receiver = self.receiver.lock().take().ok_or_else(|| {
            TransportError::Connect(format!("channel for session {session_id} already subscribed"))
        })?;

        Ok(stream::unfold(receiver, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        })
        .boxed())
    }
}
