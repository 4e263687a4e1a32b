use crate::{
    error::Result,
    models::{
        event::Event,
        session::{Id, Properties},
    },
    repositories::store::Store,
};

/// Records a named event against a session.
///
/// A missing session id is passed to the store as-is; the store decides
/// whether to accept it. Single attempt, no retries.
pub async fn record_event(
    store: &dyn Store,
    session_id: Option<&Id>,
    name: &str,
    properties: Properties,
) -> Result<Event> {
    let event = store.save_event(session_id, name, properties).await?;
    tracing::debug!(
        "📊 Event '{}' recorded as {} (session: {})",
        event.name,
        event.id,
        session_id.map(Id::to_token).unwrap_or_else(|| "none".to_string())
    );
    Ok(event)
}
