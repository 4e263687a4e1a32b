use axum::extract::Query;
use http::{header, request::Parts, Extensions, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

/// A read-only view of an inbound request, as seen by the tracking core.
///
/// Every field may be empty; nothing here is validated.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    pub method: Method,
    pub host: Option<String>,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: HeaderMap,
    pub remote_addr: Option<IpAddr>,
    /// Extensions inserted by upstream layers, e.g. an authenticated user.
    pub extensions: Extensions,
    /// The session token carried in the tracking cookie.
    pub session_token: Option<String>,
}

/// Parses the query string of `uri`. An unparseable query yields no parameters.
fn parse_query(uri: &Uri) -> BTreeMap<String, String> {
    match Query::<BTreeMap<String, String>>::try_from_uri(uri) {
        Ok(Query(params)) => params,
        Err(e) => {
            tracing::debug!("Ignoring unparseable query string: {}", e);
            BTreeMap::new()
        }
    }
}

impl Connection {
    /// Creates a snapshot for `method` and `uri` with no headers or address.
    pub fn new(method: Method, uri: &Uri) -> Self {
        Self {
            method,
            host: uri.host().map(str::to_string),
            path: uri.path().to_string(),
            query: parse_query(uri),
            ..Default::default()
        }
    }

    /// Creates a snapshot from the request head.
    pub fn from_parts(
        parts: &Parts,
        remote_addr: Option<SocketAddr>,
        session_token: Option<String>,
    ) -> Self {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.host().map(str::to_string));

        Self {
            method: parts.method.clone(),
            host,
            path: parts.uri.path().to_string(),
            query: parse_query(&parts.uri),
            headers: parts.headers.clone(),
            remote_addr: remote_addr.map(|addr| addr.ip()),
            extensions: parts.extensions.clone(),
            session_token,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Returns the first value of a header. Lookup is case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(header::USER_AGENT.as_str())
    }
}
