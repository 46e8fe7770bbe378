//! Explicit per-session document store.
//!
//! Each session owns exactly one document. Entries expire after `ttl` of
//! inactivity, and the least recently active sessions are evicted once the
//! store holds more than `max_sessions`.
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::SessionSettings;
use crate::traits::DocumentStore;
use crate::types::Document;

struct SessionEntry {
    document: Arc<Document>,
    last_active: Instant,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            max_sessions,
        }
    }

    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self::new(Duration::from_secs(settings.ttl_secs), settings.max_sessions)
    }

    /// Store `document` for `session_id`, replacing any previous upload.
    pub fn insert(&self, session_id: &str, document: Document) -> Arc<Document> {
        self.insert_at(session_id, document, Instant::now())
    }

    pub fn insert_at(&self, session_id: &str, document: Document, now: Instant) -> Arc<Document> {
        let document = Arc::new(document);
        let entry = SessionEntry {
            document: Arc::clone(&document),
            last_active: now,
        };
        self.sessions.lock().insert(session_id.to_string(), entry);
        document
    }

    /// Fetch the session's document and mark the session active.
    pub fn get(&self, session_id: &str) -> Option<Arc<Document>> {
        self.get_at(session_id, Instant::now())
    }

    pub fn get_at(&self, session_id: &str, now: Instant) -> Option<Arc<Document>> {
        let mut sessions = self.sessions.lock();
        let entry = sessions.get_mut(session_id)?;
        entry.last_active = now;
        Some(Arc::clone(&entry.document))
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<Document>> {
        self.sessions.lock().remove(session_id).map(|e| e.document)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict expired and surplus sessions; returns the evicted ids.
    pub fn cleanup(&self) -> Vec<String> {
        self.cleanup_at(Instant::now())
    }

    pub fn cleanup_at(&self, now: Instant) -> Vec<String> {
        let mut sessions = self.sessions.lock();
        let mut evicted: Vec<String> = sessions
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.last_active) > self.ttl)
            .map(|(id, _)| id.clone())
            .collect();
        evicted.sort();
        for id in &evicted {
            sessions.remove(id);
        }

        while sessions.len() > self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by(|a, b| {
                    a.1.last_active
                        .cmp(&b.1.last_active)
                        .then_with(|| a.0.cmp(b.0))
                })
                .map(|(id, _)| id.clone());
            let Some(oldest) = oldest else { break };
            sessions.remove(&oldest);
            evicted.push(oldest);
        }
        if !evicted.is_empty() {
            info!(
                evicted = evicted.len(),
                remaining = sessions.len(),
                "session cleanup"
            );
        }
        evicted
    }
}

impl DocumentStore for SessionStore {
    fn document(&self, session_id: &str) -> Option<Arc<Document>> {
        self.get(session_id)
    }
}
