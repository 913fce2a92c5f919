use crate::session::ChatSession;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

/// A session shared between the handlers of one browser tab.
///
/// The mutex serializes turns: a session never has more than one request in
/// flight.
pub type SharedSession = Arc<Mutex<ChatSession>>;

/// Sessions by id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores `session` and returns its shared handle.
    async fn create(&self, session: ChatSession) -> SharedSession;
    /// Looks up a session, marking it active.
    async fn get(&self, id: Uuid) -> Option<SharedSession>;
    /// Returns false when `id` was unknown.
    async fn remove(&self, id: Uuid) -> bool;
    /// Ids of all stored sessions.
    async fn list(&self) -> Vec<Uuid>;
    /// Number of stored sessions.
    async fn count(&self) -> usize;
    /// Drops sessions not looked up for longer than `max_idle` and not held
    /// by anyone else (an open chat socket holds its session). Returns how
    /// many were removed.
    async fn remove_idle(&self, max_idle: Duration) -> usize;
}

struct StoredSession {
    shared: SharedSession,
    last_access: Instant,
}

/// Process-local session store. Sessions live until removed or swept by
/// [`SessionStore::remove_idle`].
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, StoredSession>>,
}

impl InMemorySessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: ChatSession) -> SharedSession {
        let id = session.id;
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(
            id,
            StoredSession {
                shared: shared.clone(),
                last_access: Instant::now(),
            },
        );
        debug!(session_id = %id, "Session created");
        shared
    }

    async fn get(&self, id: Uuid) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions.get_mut(&id)?;
        stored.last_access = Instant::now();
        Some(stored.shared.clone())
    }

    async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Session removed");
        }
        removed
    }

    async fn list(&self) -> Vec<Uuid> {
        self.sessions.read().await.keys().copied().collect()
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn remove_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, stored| {
            let expired = stored.last_access.elapsed() >= max_idle
                && Arc::strong_count(&stored.shared) == 1;
            if expired {
                debug!(session_id = %id, "Idle session expired");
            }
            !expired
        });
        before - sessions.len()
    }
}
