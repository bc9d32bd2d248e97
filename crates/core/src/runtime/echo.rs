//! A runtime that answers every request with itself.
//!
//! Useful for local development of clients and for exercising the gateway
//! without a model behind it.

use super::{AgentRuntime, EventStream};
use crate::{
    event::{AgentEvent, Blob, Content, Part},
    queue::{LiveRequest, LiveRequestReceiver},
    session::SessionHandle,
};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::info;

/// MIME type the echoed audio is labelled with.
pub const ECHO_AUDIO_MIME: &str = "audio/pcm;rate=24000";

#[derive(Debug, Default, Clone, Copy)]
pub struct EchoRuntime;

#[async_trait]
impl AgentRuntime for EchoRuntime {
    async fn run_live(
        &self,
        session: SessionHandle,
        requests: LiveRequestReceiver,
    ) -> Result<EventStream> {
        info!(session = %session.key(), "Echo runtime attached");
        Ok(Box::pin(requests.map(|request| Ok(echo(request)))))
    }
}

fn echo(request: LiveRequest) -> AgentEvent {
    match request {
        LiveRequest::Realtime(blob) => AgentEvent::from_content(Content::model(vec![
            Part::InlineData(Blob::new(blob.data, ECHO_AUDIO_MIME)),
        ])),
        LiveRequest::Content(content) => AgentEvent::from_content(Content::model(content.parts)),
    }
}
