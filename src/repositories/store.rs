use async_trait::async_trait;

use crate::{
    error::Result,
    models::{
        event::Event,
        session::{Id, Properties, Session, SessionPatch},
    },
};

/// Persistence capability for sessions and events.
///
/// Implementations must apply [`SessionPatch`] as a field merge, never a full
/// record overwrite, and must not replace a `user_id` that is already set.
/// Concurrent identification of one session then converges on the first
/// writer's user.
#[async_trait]
pub trait Store: Send + Sync {
    /// Creates a session and assigns its id.
    async fn create_session(
        &self,
        user_id: Option<String>,
        properties: Properties,
    ) -> Result<Session>;

    /// Merges `patch` into a stored session and returns the stored result.
    async fn update_session(&self, session: &Session, patch: SessionPatch) -> Result<Session>;

    /// Looks up a session. `Ok(None)` means not found.
    async fn get_session(&self, id: &Id) -> Result<Option<Session>>;

    /// Stores an event. A `None` session reference is passed through as-is.
    async fn save_event(
        &self,
        session_id: Option<&Id>,
        name: &str,
        properties: Properties,
    ) -> Result<Event>;

    /// Looks up an event. `Ok(None)` means not found.
    async fn get_event(&self, id: &Id) -> Result<Option<Event>>;
}
