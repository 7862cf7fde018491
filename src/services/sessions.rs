use crate::models::ConversationState;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session limit of {0} reached")]
    CapacityReached(u64),
}

/// What to do when an operation names a session the store does not hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownSessionPolicy {
    /// Silently open a fresh `New` session under that id
    #[default]
    Create,
    /// Report `SessionError::NotFound`
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub unknown_session: UnknownSessionPolicy,
    /// Sessions untouched for this long are evicted
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
    /// Live sessions allowed at once. New sessions are refused beyond it;
    /// existing ones leave only through idle expiry or removal.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            unknown_session: UnknownSessionPolicy::default(),
            idle_ttl_secs: default_idle_ttl_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_idle_ttl_secs() -> u64 { 1800 }
fn default_max_sessions() -> u64 { 10_000 }

/// Exclusive access to one session. The tokio mutex queues waiters in FIFO
/// order, so turns for a session are applied in the order they arrive.
pub type SessionHandle = Arc<Mutex<ConversationState>>;

/// In-memory session table
///
/// Each session sits behind its own lock; distinct sessions never contend.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<String, SessionHandle>,
    policy: UnknownSessionPolicy,
    max_sessions: u64,
}

impl SessionStore {
    pub fn new(settings: &SessionSettings) -> Self {
        // No size bound on the cache itself: its eviction would drop live sessions
        let sessions = Cache::builder()
            .time_to_idle(Duration::from_secs(settings.idle_ttl_secs.max(1)))
            .build();
        Self {
            sessions,
            policy: settings.unknown_session,
            max_sessions: settings.max_sessions.max(1),
        }
    }

    pub fn policy(&self) -> UnknownSessionPolicy {
        self.policy
    }

    /// Open a session under a fresh UUID
    pub async fn create(&self) -> Result<(String, SessionHandle), SessionError> {
        let id = uuid::Uuid::new_v4().to_string();
        let handle = self.insert_new(&id).await?;
        Ok((id, handle))
    }

    /// Look a session up, applying the unknown-session policy
    pub async fn open(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.sessions.get(session_id).await {
            return Ok(handle);
        }
        match self.policy {
            UnknownSessionPolicy::Create => self.insert_new(session_id).await,
            UnknownSessionPolicy::Strict => Err(SessionError::NotFound(session_id.to_string())),
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).await
    }

    pub async fn remove(&self, session_id: &str) {
        self.sessions.invalidate(session_id).await;
    }

    /// Approximate, pending evictions may still be counted
    pub fn len(&self) -> u64 {
        self.sessions.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concurrent callers racing on the same id all get the same handle.
    /// Callers racing on distinct ids can overshoot the limit by their number.
    async fn insert_new(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.sessions.get(session_id).await {
            return Ok(handle);
        }

        // Flush pending expiries and writes so the count is current
        self.sessions.run_pending_tasks().await;
        if self.sessions.entry_count() >= self.max_sessions {
            tracing::warn!("Refusing session {}: {} sessions live", session_id, self.max_sessions);
            return Err(SessionError::CapacityReached(self.max_sessions));
        }

        let id = session_id.to_string();
        let handle = self
            .sessions
            .get_with(id.clone(), async move {
                tracing::debug!("Opening session {}", id);
                Arc::new(Mutex::new(ConversationState::new(id)))
            })
            .await;
        Ok(handle)
    }
}
