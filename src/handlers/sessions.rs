use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Serialize;

use crate::{
    error::{AppError, Result},
    models::session::{Properties, TrackedSession},
    state::AppState,
};

/// The response payload describing the caller's session.
#[derive(Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub is_new: bool,
    pub properties: Properties,
    pub inserted_at: String,
}

/// Returns the session resolved for the current request.
#[axum::debug_handler]
pub async fn current_session(
    State(state): State<AppState>,
    tracked: Option<Extension<TrackedSession>>,
) -> Result<Response> {
    let Extension(tracked) = tracked.ok_or(AppError::NotFound)?;

    let session = state
        .tracker
        .store()
        .get_session(&tracked.id)
        .await?
        .ok_or(AppError::NotFound)?;

    let body = sonic_rs::to_string(&SessionResponse {
        id: session.id.to_token(),
        user_id: session.user_id,
        is_new: tracked.is_new,
        properties: session.properties,
        inserted_at: session.inserted_at.to_rfc3339(),
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}
