//! Sessions keyed by id, for transports where one connection carries
//! requests from many sessions (HTTP).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::RwLock;

use super::Session;

struct Entry {
    session: Arc<Session>,
    last_seen: Mutex<Instant>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<Session>) -> String {
        let id = session.id().to_string();
        let entry = Entry {
            session,
            last_seen: Mutex::new(Instant::now()),
        };
        self.sessions.write().await.insert(id.clone(), entry);
        id
    }

    /// Look up a session and mark it as used.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(id)?;
        *entry.last_seen.lock() = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    /// Remove a session and close it.
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let entry = self.sessions.write().await.remove(id)?;
        entry.session.close();
        Some(entry.session)
    }

    /// Drop sessions that have closed themselves or have not been used for
    /// `max_idle`. Idle sessions are closed on the way out.
    pub async fn prune(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            if entry.session.is_closed() {
                return false;
            }
            if entry.last_seen.lock().elapsed() >= max_idle {
                tracing::info!("HTTP session {id} expired after {max_idle:?} idle");
                entry.session.close();
                return false;
            }
            true
        });
        before - sessions.len()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
