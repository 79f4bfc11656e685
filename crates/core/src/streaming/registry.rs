use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::session::StreamingSession;
use super::types::{SessionInfo, StreamError};
use crate::metrics::ACTIVE_SESSIONS;

/// Live sessions by id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Arc<StreamingSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<StreamingSession>) {
        let mut sessions = self.sessions.lock();
        sessions.insert(session.id(), session);
        ACTIVE_SESSIONS.set(sessions.len() as i64);
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<StreamingSession>> {
        self.sessions.lock().get(&id).cloned()
    }

    /// Removes and closes a session.
    pub fn remove(&self, id: Uuid) -> Result<Arc<StreamingSession>, StreamError> {
        let session = {
            let mut sessions = self.sessions.lock();
            let session = sessions.remove(&id).ok_or(StreamError::NotFound { id })?;
            ACTIVE_SESSIONS.set(sessions.len() as i64);
            session
        };
        session.close();
        Ok(session)
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<_> = self.sessions.lock().values().map(|s| s.info()).collect();
        infos.sort_by_key(|info| info.created_at);
        infos
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every session. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut sessions = self.sessions.lock();
            let drained = sessions.drain().map(|(_, s)| s).collect();
            ACTIVE_SESSIONS.set(0);
            drained
        };
        for session in &drained {
            session.close();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "Closed all sessions");
        }
        drained.len()
    }
}
