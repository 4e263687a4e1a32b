use async_trait::async_trait;
use http::HeaderName;
use serde_json::Value;
use std::sync::Arc;

use crate::models::{connection::Connection, session::Properties};

/// Hooks the embedding application supplies to the tracker.
///
/// Only `identify_user` is required. Not finding a user is the normal case and
/// is reported as `Ok(None)`. An `Err` is logged and also treated as anonymous.
#[async_trait]
pub trait Identify: Send + Sync {
    async fn identify_user(&self, conn: &Connection) -> anyhow::Result<Option<String>>;

    /// Properties recorded with every "request" event.
    fn request_properties(&self, conn: &Connection) -> Properties {
        default_request_properties(conn)
    }

    /// Extra properties stored under the `properties` key of a new session.
    fn session_properties(&self, _conn: &Connection) -> Properties {
        Properties::new()
    }
}

/// The default request properties: `params`, `host`, `method` and `path`.
pub fn default_request_properties(conn: &Connection) -> Properties {
    let params: Properties = conn
        .query
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    let mut properties = Properties::new();
    properties.insert("params".to_string(), Value::Object(params));
    properties.insert(
        "host".to_string(),
        conn.host.clone().map(Value::String).unwrap_or(Value::Null),
    );
    properties.insert("method".to_string(), Value::String(conn.method.to_string()));
    properties.insert("path".to_string(), Value::String(conn.path.clone()));
    properties
}

/// Runs the identification hook, folding failures into "anonymous".
pub async fn identify(identifier: &dyn Identify, conn: &Connection) -> Option<String> {
    match identifier.identify_user(conn).await {
        Ok(user_id) => user_id.filter(|id| !id.is_empty()),
        Err(e) => {
            tracing::debug!("User identification failed, continuing anonymously: {:#}", e);
            None
        }
    }
}

/// Never identifies anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentifier;

#[async_trait]
impl Identify for AnonymousIdentifier {
    async fn identify_user(&self, _conn: &Connection) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Identifies the user from a request header set by an upstream auth layer.
///
/// The header is trusted as-is. Deploy it only behind a proxy or auth layer
/// that strips the client's copy and sets its own, otherwise any client can
/// bind its session to an arbitrary user id, and identification is permanent.
#[derive(Debug, Clone)]
pub struct HeaderIdentifier {
    header: HeaderName,
}

impl HeaderIdentifier {
    pub fn new(header: &str) -> anyhow::Result<Self> {
        Ok(Self {
            header: HeaderName::from_bytes(header.as_bytes())?,
        })
    }
}

/// Builds the identifier for the configured identity header.
///
/// Without a header every session stays anonymous.
pub fn identifier_for(header: Option<&str>) -> anyhow::Result<Arc<dyn Identify>> {
    match header {
        Some(header) => Ok(Arc::new(HeaderIdentifier::new(header)?)),
        None => Ok(Arc::new(AnonymousIdentifier)),
    }
}

#[async_trait]
impl Identify for HeaderIdentifier {
    async fn identify_user(&self, conn: &Connection) -> anyhow::Result<Option<String>> {
        match conn.headers.get(&self.header) {
            Some(value) => Ok(Some(value.to_str()?.trim().to_string())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Uri};

    struct Failing;

    #[async_trait]
    impl Identify for Failing {
        async fn identify_user(&self, _conn: &Connection) -> anyhow::Result<Option<String>> {
            anyhow::bail!("auth backend down")
        }
    }

    #[test]
    fn default_request_properties_cover_params_host_method_path() {
        let uri: Uri = "http://shop.test/cart?item=3".parse().unwrap();
        let conn = Connection::new(Method::GET, &uri);

        let props = default_request_properties(&conn);
        assert_eq!(props["params"]["item"], "3");
        assert_eq!(props["host"], "shop.test");
        assert_eq!(props["method"], "GET");
        assert_eq!(props["path"], "/cart");
    }

    #[tokio::test]
    async fn failures_are_anonymous() {
        assert_eq!(identify(&Failing, &Connection::default()).await, None);
    }

    #[tokio::test]
    async fn header_identifier_reads_configured_header() {
        let identifier = HeaderIdentifier::new("x-user-id").unwrap();
        let conn = Connection::default().with_header(HeaderName::from_static("x-user-id"), " 42 ");

        assert_eq!(identify(&identifier, &conn).await.as_deref(), Some("42"));
        assert_eq!(identify(&identifier, &Connection::default()).await, None);
    }

    #[tokio::test]
    async fn no_identity_header_keeps_sessions_anonymous() {
        let conn = Connection::default().with_header(HeaderName::from_static("x-user-id"), "42");

        let anonymous = identifier_for(None).unwrap();
        assert_eq!(identify(anonymous.as_ref(), &conn).await, None);

        let header = identifier_for(Some("x-user-id")).unwrap();
        assert_eq!(identify(header.as_ref(), &conn).await.as_deref(), Some("42"));

        assert!(identifier_for(Some("bad header")).is_err());
    }
}
