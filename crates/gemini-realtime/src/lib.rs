//! Minimal client for the Gemini Live bidirectional streaming API.

mod client;
pub mod types;

pub use client::{LIVE_API_URL, LiveReceiver, LiveSender, connect, connect_to, endpoint};
