//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources: the session registry and the agent runtime.

use crate::config::Config;
use frontdesk_core::{AgentRuntime, SessionService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionService>,
    pub runtime: Arc<dyn AgentRuntime>,
    pub config: Arc<Config>,
}
