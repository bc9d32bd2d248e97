//! WebSocket Session Gateway
//!
//! This module contains the per-connection logic for live agent sessions.
//! It is structured into submodules:
//!
//! - `protocol`: The JSON message format exchanged with the client.
//! - `classify`: Picks the single client message an agent event maps to.
//! - `pump`: The upstream (client to agent) and downstream (agent to client) tasks.
//! - `session`: The connection lifecycle that runs both pumps and tears them down.

pub mod classify;
pub mod protocol;
pub mod pump;
pub mod session;

pub use session::{GatewayState, SessionReport, run_session, ws_handler};
