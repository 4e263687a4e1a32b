//! Session identity resolution.
//!
//! A session moves from anonymous to identified at most once:
//!
//! ```text
//! (no token) --create--> anonymous | identified
//! anonymous  --user found, update--> identified
//! anonymous  --no user--> anonymous (no write)
//! identified: terminal
//! ```

use serde_json::Value;

use crate::{
    error::Result,
    models::{
        connection::Connection,
        session::{Id, Session, SessionPatch},
    },
    repositories::store::Store,
    services::{
        identify::{identify, Identify},
        parser,
    },
};

/// The session a request resolved to.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub session: Session,
    /// Whether the session was created during resolution.
    pub is_new: bool,
}

/// Creates a session row for `conn`.
///
/// The stored properties are the parsed session attributes, with the
/// identifier's session properties nested under `properties`.
pub async fn create_session(
    store: &dyn Store,
    identifier: &dyn Identify,
    conn: &Connection,
) -> Result<Session> {
    let mut properties = parser::parse(conn).to_properties();
    properties.insert(
        "properties".to_string(),
        Value::Object(identifier.session_properties(conn)),
    );

    let user_id = identify(identifier, conn).await;
    let session = store.create_session(user_id, properties).await?;

    tracing::debug!(
        "🆕 Session {} created ({})",
        session.id,
        if session.is_identified() { "identified" } else { "anonymous" }
    );
    Ok(session)
}

/// Resolves the session carried by `token`, creating or identifying it as needed.
///
/// Performs at most one store write. Store failures are returned unchanged.
pub async fn resolve_session(
    store: &dyn Store,
    identifier: &dyn Identify,
    token: Option<&str>,
    conn: &Connection,
) -> Result<Resolution> {
    let existing = match token.and_then(Id::from_token) {
        Some(id) => {
            let found = store.get_session(&id).await?;
            if found.is_none() {
                tracing::debug!("Session token {} is unknown to the store, starting a new session", id);
            }
            found
        }
        None => None,
    };

    let Some(session) = existing else {
        let session = create_session(store, identifier, conn).await?;
        return Ok(Resolution {
            session,
            is_new: true,
        });
    };

    if session.is_identified() {
        return Ok(Resolution {
            session,
            is_new: false,
        });
    }

    let session = match identify(identifier, conn).await {
        Some(user_id) => {
            tracing::debug!("🔑 Identifying session {} as user {}", session.id, user_id);
            store
                .update_session(&session, SessionPatch::identify(user_id))
                .await?
        }
        None => session,
    };

    Ok(Resolution {
        session,
        is_new: false,
    })
}
