//! In-memory registry of wizard sessions

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use super::session::{PipelineSession, SharedSession};

/// Holds every live session. Each session has its own lock so one user's
/// slow background removal never blocks another session.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    /// Sessions untouched for longer than this are discarded
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Start a new session in the idle stage
    pub fn create(&self) -> SharedSession {
        self.sweep_expired();

        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(PipelineSession::new(id)));
        self.sessions.write().insert(id, session.clone());

        info!(session_id = %id, "Session created");
        session
    }

    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.read().get(id).cloned()
    }

    /// Drop a session and everything derived in it
    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            info!(session_id = %id, "Session discarded");
        }
        removed
    }

    /// Discard idle sessions, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();

        sessions.retain(|id, session| {
            // A request still holds it
            if Arc::strong_count(session) > 1 {
                return true;
            }

            let idle = (now - session.lock().updated_at()).to_std();
            match idle {
                Ok(idle) if idle > self.ttl => {
                    info!(session_id = %id, idle_secs = idle.as_secs(), "Session expired");
                    false
                }
                _ => true,
            }
        });

        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_create_get_remove() {
        let store = SessionStore::new(TTL);
        assert!(store.is_empty());

        let session = store.create();
        let id = session.lock().id();
        assert_eq!(store.len(), 1);

        let fetched = store.get(&id).unwrap();
        assert_eq!(fetched.lock().stage(), Stage::Idle);

        assert!(store.remove(&id));
        assert!(!store.remove(&id));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = SessionStore::new(TTL);
        let id = store.create().lock().id();

        assert_eq!(store.sweep_expired_at(Utc::now()), 0);
        assert_eq!(store.len(), 1);

        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(store.sweep_expired_at(later), 1);
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_sessions_in_use_are_kept() {
        let store = SessionStore::new(TTL);
        let held = store.create();
        let id = held.lock().id();

        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(store.sweep_expired_at(later), 0);
        assert!(store.get(&id).is_some());

        drop(held);
        assert_eq!(store.sweep_expired_at(later), 1);
    }

    #[test]
    fn test_create_sweeps_stale_sessions() {
        let store = SessionStore::new(Duration::ZERO);
        let first = store.create().lock().id();
        std::thread::sleep(Duration::from_millis(5));

        store.create();
        assert!(store.get(&first).is_none());
        assert_eq!(store.len(), 1);
    }
}
