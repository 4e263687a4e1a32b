use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An arbitrary key/value mapping stored with sessions and events.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// A store-assigned record identifier.
///
/// Numeric ids render as decimal strings, textual ids pass through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Int(i64),
    Text(String),
}

impl Id {
    /// Parses a session token read back from a cookie.
    ///
    /// Returns `None` for an empty token.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        Some(match token.parse::<i64>() {
            Ok(n) => Id::Int(n),
            Err(_) => Id::Text(token.to_string()),
        })
    }

    /// Renders the id as the token carried in the session cookie.
    pub fn to_token(&self) -> String {
        self.to_string()
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Id::Int(n) => Some(*n),
            Id::Text(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(n) => write!(f, "{}", n),
            Id::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Int(n)
    }
}

/// A persisted browser session.
///
/// `user_id` is `None` while the session is anonymous. Once set it is never
/// cleared or replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The store-assigned identifier, also the cookie token.
    pub id: Id,
    /// The identified user, if any.
    pub user_id: Option<String>,
    /// Parsed request attributes plus caller-supplied extras.
    pub properties: Properties,
    /// The timestamp when the session was created.
    pub inserted_at: DateTime<Utc>,
}

impl Session {
    pub fn is_identified(&self) -> bool {
        self.user_id.is_some()
    }
}

/// A partial update applied to a stored session.
///
/// Fields left as `None` are untouched by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub user_id: Option<String>,
}

impl SessionPatch {
    /// A patch that identifies the session as belonging to `user_id`.
    pub fn identify(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }
}

/// The session resolved for the current request, exposed to handlers as a
/// request extension.
#[derive(Debug, Clone)]
pub struct TrackedSession {
    pub id: Id,
    pub user_id: Option<String>,
    /// Whether the session was created by this request.
    pub is_new: bool,
}
