use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use lear::{
    config::TrackingConfig,
    error::{AppError, Result},
    models::{
        event::Event,
        session::{Id, Properties, Session, SessionPatch},
    },
    repositories::{memory::MemoryStore, store::Store},
    router::build_router,
    services::{identify::HeaderIdentifier, tracker::Tracker},
    state::AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";
const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

// Shared test context
struct TestContext {
    app: Router,
    store: MemoryStore,
}

impl TestContext {
    fn new() -> Self {
        let store = MemoryStore::new();
        let tracker = Tracker::new(
            Arc::new(store.clone()),
            Arc::new(HeaderIdentifier::new("x-user-id").unwrap()),
            TrackingConfig::default(),
        );
        Self {
            app: build_router(AppState::with_tracker(tracker)),
            store,
        }
    }

    fn request(method: &str, uri: &str) -> http::request::Builder {
        Self::request_as(method, uri, CHROME_MAC)
    }

    fn request_as(method: &str, uri: &str, user_agent: &str) -> http::request::Builder {
        let addr: SocketAddr = "127.0.0.1:51000".parse().unwrap();
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, user_agent)
            .extension(ConnectInfo(addr))
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("_lear_session_="))
        .map(|v| {
            v.trim_start_matches("_lear_session_=")
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string()
        })
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A store whose every operation fails.
struct OfflineStore;

#[async_trait]
impl Store for OfflineStore {
    async fn create_session(&self, _: Option<String>, _: Properties) -> Result<Session> {
        Err(AppError::Internal("connection refused".into()))
    }

    async fn update_session(&self, _: &Session, _: SessionPatch) -> Result<Session> {
        Err(AppError::Internal("connection refused".into()))
    }

    async fn get_session(&self, _: &Id) -> Result<Option<Session>> {
        Err(AppError::Internal("connection refused".into()))
    }

    async fn save_event(&self, _: Option<&Id>, _: &str, _: Properties) -> Result<Event> {
        Err(AppError::Internal("connection refused".into()))
    }

    async fn get_event(&self, _: &Id) -> Result<Option<Event>> {
        Err(AppError::Internal("connection refused".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_visit_creates_session_and_request_event() {
        let context = TestContext::new();

        let response = context
            .send(
                TestContext::request("GET", "/health?utm_campaign=spring&ref=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let token = session_cookie(&response).expect("session cookie not set");
        assert_eq!(token, "1");

        assert_eq!(context.store.session_count().await, 1);
        let session = context.store.get_session(&Id::Int(1)).await.unwrap().unwrap();
        assert_eq!(session.user_id, None);
        assert_eq!(session.properties["browser"], "Chrome");
        assert_eq!(session.properties["os"], "mac");
        assert_eq!(session.properties["device_type"], "desktop");
        assert_eq!(session.properties["ip"], "127.0.0.1");
        assert_eq!(session.properties["landing_page"], "/health");
        assert_eq!(session.properties["utm_campaign"], "spring");
        assert!(!session.properties.contains_key("ref"));

        let events = context.store.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "request");
        assert_eq!(events[0].session_id, Some(Id::Int(1)));
        assert_eq!(events[0].properties["path"], "/health");
    }

    #[tokio::test]
    async fn test_returning_visitor_reuses_session() {
        let context = TestContext::new();

        let first = context
            .send(TestContext::request("GET", "/health").body(Body::empty()).unwrap())
            .await;
        let token = session_cookie(&first).unwrap();

        let second = context
            .send(
                TestContext::request("GET", "/health")
                    .header(header::COOKIE, format!("_lear_session_={}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(session_cookie(&second), None);
        assert_eq!(context.store.session_count().await, 1);

        let events = context.store.events().await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.session_id == Some(Id::Int(1))));
    }

    #[tokio::test]
    async fn test_login_upgrades_anonymous_session_once() {
        let context = TestContext::new();

        let first = context
            .send(TestContext::request("GET", "/health").body(Body::empty()).unwrap())
            .await;
        let cookie = format!("_lear_session_={}", session_cookie(&first).unwrap());

        context
            .send(
                TestContext::request("GET", "/health")
                    .header(header::COOKIE, cookie.as_str())
                    .header("x-user-id", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        context
            .send(
                TestContext::request("GET", "/health")
                    .header(header::COOKIE, cookie.as_str())
                    .header("x-user-id", "mallory")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        let session = context.store.get_session(&Id::Int(1)).await.unwrap().unwrap();
        assert_eq!(session.user_id.as_deref(), Some("alice"));
        assert_eq!(context.store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_untrackable_methods_still_get_a_session() {
        let context = TestContext::new();

        let response = context
            .send(
                TestContext::request("POST", "/api/events")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"cta_clicked","properties":{"variant":"b"}}"#))
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(session_cookie(&response).is_some());

        let body = body_json(response).await;
        assert_eq!(body["name"], "cta_clicked");
        assert_eq!(body["session_id"], "1");

        let events = context.store.events().await;
        assert_eq!(events.len(), 1, "POST must not record a request event");
        assert_eq!(events[0].name, "cta_clicked");
        assert_eq!(events[0].properties["variant"], "b");
    }

    #[tokio::test]
    async fn test_invalid_event_name_is_rejected() {
        let context = TestContext::new();

        let response = context
            .send(
                TestContext::request("POST", "/api/events")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"bad name!"}"#))
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(context.store.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_current_session_endpoint() {
        let context = TestContext::new();

        let response = context
            .send(TestContext::request("GET", "/api/session").body(Body::empty()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], "1");
        assert_eq!(body["is_new"], true);
        assert_eq!(body["user_id"], serde_json::Value::Null);
        assert_eq!(body["properties"]["landing_page"], "/api/session");
    }

    #[tokio::test]
    async fn test_stale_cookie_is_replaced() {
        let context = TestContext::new();

        let response = context
            .send(
                TestContext::request("GET", "/health")
                    .header(header::COOKIE, "_lear_session_=404")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(session_cookie(&response).as_deref(), Some("1"));
        assert_eq!(context.store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_bots_are_not_tracked() {
        let context = TestContext::new();

        let response = context
            .send(
                TestContext::request_as("GET", "/health", GOOGLEBOT)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(session_cookie(&response), None);
        assert_eq!(context.store.session_count().await, 0);
        assert!(context.store.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_does_not_break_responses() {
        let tracker = Tracker::new(
            Arc::new(OfflineStore),
            Arc::new(HeaderIdentifier::new("x-user-id").unwrap()),
            TrackingConfig::default(),
        );
        let app = build_router(AppState::with_tracker(tracker));

        let response = app
            .oneshot(
                TestContext::request("GET", "/health")
                    .header(header::COOKIE, "_lear_session_=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(session_cookie(&response), None);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_session_cookie_carries_configured_lifetime() {
        let tracker = Tracker::new(
            Arc::new(MemoryStore::new()),
            Arc::new(HeaderIdentifier::new("x-user-id").unwrap()),
            TrackingConfig {
                cookie_max_age_secs: i64::MAX / 1000,
                secure_cookie: true,
                ..TrackingConfig::default()
            },
        );
        let app = build_router(AppState::with_tracker(tracker));

        let response = app
            .oneshot(TestContext::request("GET", "/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.contains(&format!("Max-Age={}", i64::MAX / 1000)), "{set_cookie}");
        assert!(set_cookie.contains("Secure"), "{set_cookie}");
        assert!(set_cookie.contains("HttpOnly"), "{set_cookie}");
    }
}
