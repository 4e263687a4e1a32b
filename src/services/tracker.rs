use std::sync::Arc;

use crate::{
    config::TrackingConfig,
    error::Result,
    models::{
        connection::Connection,
        event::{Event, REQUEST_EVENT},
        session::{Id, Properties, Session},
    },
    repositories::store::Store,
    services::{
        events,
        identify::Identify,
        identity::{self, Resolution},
        user_agent,
    },
};

/// Entry point for session and event tracking.
///
/// Holds the store, the application's identification hooks and the tracking
/// settings. Every call re-derives state from the connection and the store;
/// nothing is cached between calls.
#[derive(Clone)]
pub struct Tracker {
    store: Arc<dyn Store>,
    identifier: Arc<dyn Identify>,
    config: Arc<TrackingConfig>,
}

impl Tracker {
    /// Creates a new `Tracker`.
    pub fn new(
        store: Arc<dyn Store>,
        identifier: Arc<dyn Identify>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            store,
            identifier,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Returns whether the connection should be skipped as crawler traffic.
    pub fn skips(&self, conn: &Connection) -> bool {
        !self.config.track_bots && conn.user_agent().is_some_and(user_agent::is_bot)
    }

    /// Returns whether the connection's method produces a "request" event.
    pub fn is_trackable(&self, conn: &Connection) -> bool {
        self.config.is_trackable(&conn.method)
    }

    /// Resolves the session carried by the connection's token.
    pub async fn resolve_session(&self, conn: &Connection) -> Result<Resolution> {
        identity::resolve_session(
            self.store.as_ref(),
            self.identifier.as_ref(),
            conn.session_token.as_deref(),
            conn,
        )
        .await
    }

    /// Records a "request" event with the identifier's request properties.
    pub async fn track_request(&self, conn: &Connection) -> Result<Event> {
        let properties = self.identifier.request_properties(conn);
        self.track(conn, REQUEST_EVENT, properties).await
    }

    /// Creates a session row from the connection's attributes.
    pub async fn track_session(&self, conn: &Connection) -> Result<Session> {
        identity::create_session(self.store.as_ref(), self.identifier.as_ref(), conn).await
    }

    /// Records a named event against the connection's current session.
    ///
    /// The token is looked up in the store; a missing, unknown or unreadable
    /// session records the event without one.
    pub async fn track(&self, conn: &Connection, name: &str, properties: Properties) -> Result<Event> {
        let session_id = self.current_session_id(conn).await;
        events::record_event(self.store.as_ref(), session_id.as_ref(), name, properties).await
    }

    async fn current_session_id(&self, conn: &Connection) -> Option<Id> {
        let id = conn.session_token.as_deref().and_then(Id::from_token)?;
        match self.store.get_session(&id).await {
            Ok(Some(session)) => Some(session.id),
            Ok(None) => {
                tracing::debug!("Session {} not found, recording event without a session", id);
                None
            }
            Err(e) => {
                tracing::warn!("⚠️ Session lookup failed for {}, recording event without a session: {}", id, e);
                None
            }
        }
    }
}
