//! Maps agent runtime events onto the client wire protocol.
//!
//! An event may populate content, transcriptions, and tool results at the
//! same time, but the client receives at most one message per event. Which
//! one is decided by [`RULES`]: each rule looks at one part of the event, and
//! when several rules match, the one listed later wins. Within a rule the last
//! matching item wins.
//!
//! Emitting one message per populated part would also be a reasonable policy;
//! the single-message precedence is kept because clients rely on it.

use super::protocol::ServerMessage;
use frontdesk_core::{ActionResult, AgentEvent, Part};
use serde_json::{Number, Value};

/// Inspects one part of an event.
pub type Rule = fn(&AgentEvent) -> Option<ServerMessage>;

/// Classification rules in ascending precedence.
pub const RULES: [(&str, Rule); 3] = [
    ("content", from_content),
    ("transcription", from_transcription),
    ("actions", from_actions),
];

/// Picks the single outbound message for `event`, if any.
pub fn classify(event: &AgentEvent) -> Option<ServerMessage> {
    RULES
        .iter()
        .fold(None, |current, (_, rule)| rule(event).or(current))
}

/// Last content part wins: inline media becomes audio, text becomes text.
fn from_content(event: &AgentEvent) -> Option<ServerMessage> {
    event
        .content
        .as_ref()?
        .parts
        .iter()
        .map(|part| match part {
            Part::InlineData(blob) => ServerMessage::agent_audio(&blob.data),
            Part::Text(text) => ServerMessage::AgentText { text: text.clone() },
        })
        .last()
}

/// Output transcription beats input transcription.
fn from_transcription(event: &AgentEvent) -> Option<ServerMessage> {
    let output = event
        .output_transcription
        .as_ref()
        .map(|t| ServerMessage::AgentTranscript {
            text: t.text.clone(),
        });
    output.or_else(|| {
        event.input_transcription.as_ref().map(|t| {
            if t.finished {
                ServerMessage::AsrFinal {
                    text: t.text.clone(),
                }
            } else {
                ServerMessage::AsrPartial {
                    text: t.text.clone(),
                }
            }
        })
    })
}

/// Last tool result carrying a queue ticket wins.
fn from_actions(event: &AgentEvent) -> Option<ServerMessage> {
    event.actions.iter().filter_map(queue_ticket).last()
}

/// Reads a `{"queue_no": .., "eta_minutes": ..}` payload. Anything else is skipped.
fn queue_ticket(action: &ActionResult) -> Option<ServerMessage> {
    let payload: Value = serde_json::from_str(&action.response).ok()?;
    let fields = payload.as_object()?;
    let queue_no = fields.get("queue_no")?.clone();
    let eta_minutes = fields
        .get("eta_minutes")
        .and_then(eta_number)
        .unwrap_or_else(|| Number::from(0));
    Some(ServerMessage::QueueIssued {
        queue_no,
        eta_minutes,
    })
}

/// Tools report the wait either as a JSON number or as a numeric string.
fn eta_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
