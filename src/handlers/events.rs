use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Extension, Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    models::{
        connection::Connection,
        session::{Properties, TrackedSession},
    },
    state::AppState,
    validation::events::validate_event_name,
};

/// The request payload for tracking a custom event.
#[derive(Deserialize, Debug, Validate)]
pub struct TrackEventRequest {
    #[garde(custom(validate_event_name))]
    pub name: String,
    #[garde(skip)]
    #[serde(default)]
    pub properties: Properties,
}

/// The response payload for a tracked event.
#[derive(Serialize)]
pub struct TrackEventResponse {
    pub id: String,
    pub session_id: Option<String>,
    pub name: String,
}

/// Records a custom event against the caller's session.
#[axum::debug_handler]
pub async fn track_event(
    State(state): State<AppState>,
    tracked: Option<Extension<TrackedSession>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(payload): Json<TrackEventRequest>,
) -> Result<Response> {
    payload
        .validate()
        .map_err(|report| AppError::Validation(report.to_string()))?;

    let mut conn = Connection::new(method, &uri);
    conn.headers = headers;
    conn.session_token = tracked.map(|Extension(session)| session.id.to_token());

    let event = state
        .tracker
        .track(&conn, &payload.name, payload.properties)
        .await?;

    tracing::info!("📊 Custom event '{}' tracked: {}", event.name, event.id);

    let body = sonic_rs::to_string(&TrackEventResponse {
        id: event.id.to_token(),
        session_id: event.session_id.map(|id| id.to_token()),
        name: event.name,
    })?;

    Ok((
        StatusCode::CREATED,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}
