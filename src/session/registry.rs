//! Registry of running event sessions
//!
//! Each session row carries the successor pointers written by Race
//! Again. Rows are held behind per-session async mutexes: the
//! coordinator serializes competing Race Again callers by locking the
//! row, never the whole registry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::error::{MatchmakingError, Result};
use crate::types::{EventId, LobbyId, SessionId};
use crate::utils::{current_timestamp, generate_session_id};

/// A running (or finished) race session
#[derive(Debug, Clone)]
pub struct EventSession {
    pub id: SessionId,
    pub event_id: EventId,
    pub lobby_id: LobbyId,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    /// Session started with power-ups disabled
    pub nopu_mode: bool,
    /// Successor lobby written by the first Race Again caller
    pub next_lobby_id: Option<LobbyId>,
    /// Successor event written together with the lobby pointer
    pub next_event_id: Option<EventId>,
}

/// Shared map of sessions keyed by id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<EventSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a launched lobby and return its id
    pub async fn create(&self, event_id: EventId, lobby_id: LobbyId, nopu_mode: bool) -> SessionId {
        let session = EventSession {
            id: generate_session_id(),
            event_id,
            lobby_id,
            started: current_timestamp(),
            ended: None,
            nopu_mode,
            next_lobby_id: None,
            next_event_id: None,
        };
        let session_id = session.id;
        self.sessions
            .write()
            .await
            .insert(session_id, Arc::new(Mutex::new(session)));
        session_id
    }

    /// Snapshot of a session
    pub async fn get(&self, session_id: SessionId) -> Option<EventSession> {
        let row = {
            let sessions = self.sessions.read().await;
            sessions.get(&session_id).cloned()
        };
        match row {
            Some(row) => Some(row.lock().await.clone()),
            None => None,
        }
    }

    /// Handle to the session's lockable row
    pub async fn row(&self, session_id: SessionId) -> Result<Arc<Mutex<EventSession>>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| {
                MatchmakingError::UnknownSession {
                    session_id: session_id.to_string(),
                }
                .into()
            })
    }

    /// Mark a session finished. Idempotent; the first end time wins.
    pub async fn mark_ended(&self, session_id: SessionId) -> Result<()> {
        let row = self.row(session_id).await?;
        let mut session = row.lock().await;
        if session.ended.is_none() {
            session.ended = Some(current_timestamp());
        }
        Ok(())
    }
}
