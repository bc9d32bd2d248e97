//! Ephemeral session registry.
//!
//! Sessions are keyed by (application, user, session) and live for the
//! lifetime of the process. The conversation itself belongs to the agent
//! runtime; a [`Session`] only carries identity plus whatever small piece of
//! state the runtime needs to resume it on the next connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::{HashMap, hash_map::Entry},
    fmt,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

#[derive(Debug)]
pub struct Session {
    key: SessionKey,
    created_at: DateTime<Utc>,
    resumption_handle: Mutex<Option<String>>,
}

/// Shared reference to a registered session.
pub type SessionHandle = Arc<Session>;

impl Session {
    fn new(key: SessionKey) -> Self {
        Self {
            key,
            created_at: Utc::now(),
            resumption_handle: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The runtime's handle for resuming this conversation, if it issued one.
    pub fn resumption_handle(&self) -> Option<String> {
        self.resumption_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_resumption_handle(&self, handle: Option<String>) {
        *self
            .resumption_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = handle;
    }
}

/// Lookup and registration of sessions.
#[async_trait]
pub trait SessionService: Send + Sync {
    async fn get_session(&self, key: &SessionKey) -> Option<SessionHandle>;

    /// Returns the session for `key`, registering it first if it does not exist.
    async fn get_or_create(&self, key: SessionKey) -> SessionHandle;

    async fn session_count(&self) -> usize;
}

/// A `SessionService` backed by a map behind one async lock.
///
/// `get_or_create` holds the write lock for the whole check-and-insert, so two
/// connections racing on the same key always end up with the same session.
#[derive(Default)]
pub struct InMemorySessionService {
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn get_session(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.read().await.get(key).cloned()
    }

    async fn get_or_create(&self, key: SessionKey) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        match sessions.entry(key) {
            Entry::Occupied(entry) => {
                info!(session = %entry.key(), "Resuming existing session");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                info!(session = %entry.key(), "Creating new session");
                let session = Arc::new(Session::new(entry.key().clone()));
                entry.insert(session).clone()
            }
        }
    }

    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
