//! The event model produced by an agent runtime.
//!
//! An [`AgentEvent`] is deliberately loose: content, transcriptions, and tool
//! results are independent optional parts and a runtime may fill in any
//! combination of them on a single event.

use bytes::Bytes;

/// Author recorded on events generated by the agent itself.
pub const AGENT_AUTHOR: &str = "frontdesk_agent";

/// Raw media with its MIME descriptor (e.g. `audio/pcm;rate=16000`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub mime_type: String,
    pub data: Bytes,
}

impl Blob {
    pub fn new(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// One typed piece of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineData(Blob),
}

/// An ordered sequence of parts forming one logical turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Content {
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn holding a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts,
        }
    }
}

/// A server-side speech transcription fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
    pub finished: bool,
}

/// The result of one tool invocation. `response` is opaque to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub tool: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentEvent {
    pub author: Option<String>,
    pub content: Option<Content>,
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
    /// Empty when the event carries no tool results.
    pub actions: Vec<ActionResult>,
    pub turn_complete: bool,
    pub interrupted: bool,
}

impl AgentEvent {
    pub fn from_content(content: Content) -> Self {
        Self {
            author: Some(AGENT_AUTHOR.to_string()),
            content: Some(content),
            ..Default::default()
        }
    }

    pub fn from_actions(actions: Vec<ActionResult>) -> Self {
        Self {
            author: Some(AGENT_AUTHOR.to_string()),
            actions,
            ..Default::default()
        }
    }

    /// True when none of the three optional parts is populated.
    pub fn is_empty(&self) -> bool {
        self.content.as_ref().is_none_or(|c| c.parts.is_empty())
            && self.input_transcription.is_none()
            && self.output_transcription.is_none()
            && self.actions.is_empty()
    }
}
