use relay_mcp::McpServer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Messages buffered per SSE session before senders wait
const SESSION_BUFFER: usize = 32;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub server: Arc<McpServer>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(server: Arc<McpServer>) -> Self {
        Self {
            server,
            sessions: SessionStore::default(),
        }
    }
}

/// Open SSE sessions, each with a channel feeding its event stream
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, mpsc::Sender<String>>>>,
}

impl SessionStore {
    /// Register a new session and return its id and message receiver
    pub fn open(&self) -> (String, mpsc::Receiver<String>) {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        self.lock().insert(id.clone(), tx);
        tracing::debug!(session_id = %id, "SSE session opened");
        (id, rx)
    }

    pub fn sender(&self, id: &str) -> Option<mpsc::Sender<String>> {
        self.lock().get(id).cloned()
    }

    pub fn close(&self, id: &str) {
        if self.lock().remove(id).is_some() {
            tracing::debug!(session_id = %id, "SSE session closed");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, mpsc::Sender<String>>> {
        // The map stays consistent even if a holder panicked
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Removes its session when the owning event stream is dropped
pub struct SessionGuard {
    sessions: SessionStore,
    id: String,
}

impl SessionGuard {
    pub fn new(sessions: SessionStore, id: String) -> Self {
        Self { sessions, id }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.close(&self.id);
    }
}
