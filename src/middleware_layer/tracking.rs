use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    config::TrackingConfig,
    models::{connection::Connection, session::TrackedSession},
    state::AppState,
};

/// Creates the cookie carrying the session token.
fn create_session_cookie(config: &TrackingConfig, token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(config.cookie_name.clone(), token);

    cookie.set_http_only(true);

    if config.secure_cookie {
        cookie.set_secure(true);
    }

    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(config.cookie_max_age_secs));
    cookie.set_path("/");

    cookie
}

/// A middleware that resolves the visitor's session and records request events.
///
/// Tracking is best-effort: any failure is logged and the request is passed
/// on untouched.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The inner service's `Response`.
pub async fn track_connection(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Response {
    let tracker = &state.tracker;
    let config = tracker.config();

    let token = cookies
        .get(&config.cookie_name)
        .map(|cookie| cookie.value().to_string());

    let (mut parts, body) = request.into_parts();
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let mut conn = Connection::from_parts(&parts, remote_addr, token);

    if tracker.skips(&conn) {
        tracing::debug!("🤖 Skipping tracking for bot: {:?}", conn.user_agent());
        return next.run(Request::from_parts(parts, body)).await;
    }

    match tracker.resolve_session(&conn).await {
        Ok(resolution) => {
            let token = resolution.session.id.to_token();

            if conn.session_token.as_deref() != Some(token.as_str()) {
                cookies.add(create_session_cookie(config, token.clone()));
                tracing::debug!("🍪 Session cookie set: {}={}", config.cookie_name, token);
            }

            parts.extensions.insert(TrackedSession {
                id: resolution.session.id,
                user_id: resolution.session.user_id,
                is_new: resolution.is_new,
            });
            conn.session_token = Some(token);
        }
        Err(e) => {
            tracing::warn!("⚠️ Session resolution failed, continuing untracked: {}", e);
        }
    }

    if tracker.is_trackable(&conn) {
        if let Err(e) = tracker.track_request(&conn).await {
            tracing::warn!("⚠️ Failed to record request event for {}: {}", conn.path, e);
        }
    }

    next.run(Request::from_parts(parts, body)).await
}
