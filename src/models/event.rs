use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::{Id, Properties};

/// The name of the event recorded for every trackable request.
pub const REQUEST_EVENT: &str = "request";

/// A single tracked action. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Id,
    /// The session the event belongs to. `None` when session resolution failed.
    pub session_id: Option<Id>,
    pub name: String,
    pub properties: Properties,
    pub inserted_at: DateTime<Utc>,
}
