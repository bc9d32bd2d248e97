//! The seam between the gateway and the conversational agent runtime.

pub mod echo;
pub mod gemini;

use crate::{event::AgentEvent, queue::LiveRequestReceiver, session::SessionHandle};
use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// A lazy, non-restartable stream of events for one live session.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send>>;

/// An engine that turns a stream of live requests into agent events.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Starts a live run for `session` fed by `requests`.
    ///
    /// The returned stream must end once `requests` ends, i.e. once the
    /// producing queue is closed.
    async fn run_live(
        &self,
        session: SessionHandle,
        requests: LiveRequestReceiver,
    ) -> Result<EventStream>;
}
