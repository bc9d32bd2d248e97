//! The outbound request queue feeding a live agent session.
//!
//! The queue is an unbounded channel so the producer never waits on the
//! runtime. Closing drops the only sender, which the consumer observes as the
//! normal end of its stream.

use crate::event::{Blob, Content};
use bytes::Bytes;
use futures::Stream;
use std::{
    pin::Pin,
    sync::{Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::UnboundedReceiverStream};

/// One request destined for the agent runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveRequest {
    /// A raw media chunk streamed without turn framing.
    Realtime(Blob),
    /// A complete structured turn.
    Content(Content),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("the request queue has been closed")]
    Closed,
    #[error("the agent runtime is no longer consuming requests")]
    Disconnected,
}

/// Producer half. Owned by one connection and shared with its upstream pump.
#[derive(Debug)]
pub struct LiveRequestQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<LiveRequest>>>,
}

impl LiveRequestQueue {
    /// Creates a queue and the receiver a runtime consumes.
    pub fn channel() -> (Self, LiveRequestReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            LiveRequestReceiver {
                inner: UnboundedReceiverStream::new(rx),
            },
        )
    }

    pub fn send_media(
        &self,
        data: impl Into<Bytes>,
        mime_type: impl Into<String>,
    ) -> Result<(), QueueError> {
        self.send(LiveRequest::Realtime(Blob::new(data, mime_type)))
    }

    pub fn send_content(&self, content: Content) -> Result<(), QueueError> {
        self.send(LiveRequest::Content(content))
    }

    fn send(&self, request: LiveRequest) -> Result<(), QueueError> {
        match self.sender().as_ref() {
            Some(tx) => tx.send(request).map_err(|_| QueueError::Disconnected),
            None => Err(QueueError::Closed),
        }
    }

    /// Closes the queue. Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.sender().take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.sender().is_none()
    }

    // A panic while holding the lock cannot leave the Option half-updated.
    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<LiveRequest>>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Consumer half, handed to the agent runtime.
#[derive(Debug)]
pub struct LiveRequestReceiver {
    inner: UnboundedReceiverStream<LiveRequest>,
}

impl LiveRequestReceiver {
    /// Waits for the next request; `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<LiveRequest> {
        self.inner.next().await
    }
}

impl Stream for LiveRequestReceiver {
    type Item = LiveRequest;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
