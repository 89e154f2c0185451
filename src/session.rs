use crate::{Error, Result, shell::ShellStateMachine};
use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub fsm: ShellStateMachine,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            fsm: ShellStateMachine::new(),
        }
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

struct Entry {
    session: SessionHandle,
    last_active: DateTime<Utc>,
}

/// In-memory sessions, each behind its own lock.
///
/// Requests for one session are serialised by that session's mutex; the map
/// lock is only held while looking entries up.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }

    pub async fn create(&self) -> (String, SessionHandle) {
        self.evict_expired_at(Utc::now()).await;

        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(Session::new(id.clone())));
        self.sessions.write().await.insert(
            id.clone(),
            Entry {
                session: session.clone(),
                last_active: Utc::now(),
            },
        );

        info!("Session created: {}", id);
        (id, session)
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        entry.last_active = Utc::now();
        Ok(entry.session.clone())
    }

    pub async fn remove(&self, session_id: &str) -> Result<()> {
        match self.sessions.write().await.remove(session_id) {
            Some(_) => {
                info!("Session removed: {}", session_id);
                Ok(())
            }
            None => Err(Error::SessionNotFound {
                session_id: session_id.to_string(),
            }),
        }
    }

    pub async fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now()).await
    }

    /// Drops sessions idle for longer than the TTL as of `now`.
    pub async fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.signed_duration_since(entry.last_active) <= self.ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
