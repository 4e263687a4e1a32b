use async_trait::async_trait;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

use crate::{
    error::{AppError, Result},
    models::{
        event::Event,
        session::{Id, Properties, Session, SessionPatch},
    },
    repositories::store::Store,
};

#[derive(Default)]
struct Tables {
    sessions: HashMap<i64, Session>,
    events: HashMap<i64, Event>,
    next_session_id: i64,
    next_event_id: i64,
}

/// An in-process store for tests and local development.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }

    /// Returns every stored event, ordered by id.
    pub async fn events(&self) -> Vec<Event> {
        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables.events.values().cloned().collect();
        events.sort_by_key(|e| e.id.as_int());
        events
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_session(
        &self,
        user_id: Option<String>,
        properties: Properties,
    ) -> Result<Session> {
        let mut tables = self.tables.lock().await;
        tables.next_session_id += 1;
        let id = tables.next_session_id;

        let session = Session {
            id: Id::Int(id),
            user_id,
            properties,
            inserted_at: Utc::now(),
        };
        tables.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn update_session(&self, session: &Session, patch: SessionPatch) -> Result<Session> {
        let key = session.id.as_int().ok_or(AppError::NotFound)?;
        let mut tables = self.tables.lock().await;
        let stored = tables.sessions.get_mut(&key).ok_or(AppError::NotFound)?;

        if stored.user_id.is_none() {
            stored.user_id = patch.user_id;
        }
        Ok(stored.clone())
    }

    async fn get_session(&self, id: &Id) -> Result<Option<Session>> {
        let Some(key) = id.as_int() else {
            return Ok(None);
        };
        Ok(self.tables.lock().await.sessions.get(&key).cloned())
    }

    async fn save_event(
        &self,
        session_id: Option<&Id>,
        name: &str,
        properties: Properties,
    ) -> Result<Event> {
        let mut tables = self.tables.lock().await;
        tables.next_event_id += 1;
        let id = tables.next_event_id;

        let event = Event {
            id: Id::Int(id),
            session_id: session_id.cloned(),
            name: name.to_string(),
            properties,
            inserted_at: Utc::now(),
        };
        tables.events.insert(id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: &Id) -> Result<Option<Event>> {
        let Some(key) = id.as_int() else {
            return Ok(None);
        };
        Ok(self.tables.lock().await.events.get(&key).cloned())
    }
}
