use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_cookies::CookieManagerLayer;

use crate::{handlers, middleware_layer, state::AppState};

/// Builds the application router with session tracking on every route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::sessions::health))
        .route("/api/session", get(handlers::sessions::current_session))
        .route("/api/events", post(handlers::events::track_event))
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::tracking::track_connection,
        ))
        .layer(CookieManagerLayer::new())
        .with_state(state)
}
