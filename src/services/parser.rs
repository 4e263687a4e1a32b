use std::net::IpAddr;

use crate::models::{
    attributes::{SessionAttributes, UTM_KEYS},
    connection::Connection,
};
use crate::services::user_agent;

/// Renders a remote address for storage.
///
/// IPv4 is written as a dotted quad. IPv4-mapped IPv6 addresses are collapsed
/// to their IPv4 form, and any other IPv6 address uses the canonical
/// colon-hex form.
pub fn format_ip(addr: IpAddr) -> String {
    match addr.to_canonical() {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{}.{}.{}.{}", a, b, c, d)
        }
        IpAddr::V6(v6) => v6.to_string(),
    }
}

fn utm_param(conn: &Connection, key: &str) -> Option<String> {
    conn.query.get(key).cloned()
}

/// Parses the session attributes of a connection.
///
/// Pure: no I/O, and missing input yields `None` fields rather than errors.
pub fn parse(conn: &Connection) -> SessionAttributes {
    let user_agent = conn.user_agent().map(str::to_string);

    let info = user_agent
        .as_deref()
        .map(user_agent::classify)
        .unwrap_or_default();

    let os_version = match (info.platform, user_agent.as_deref()) {
        (Some(platform), Some(ua)) => user_agent::os_version(platform, ua),
        _ => None,
    };

    // Only the recognized campaign keys are read; every other parameter is dropped.
    let [utm_campaign, utm_content, utm_medium, utm_source, utm_term] =
        UTM_KEYS.map(|key| utm_param(conn, key));

    SessionAttributes {
        browser: info.browser,
        browser_version: info.browser_version,
        os: info.platform.map(|p| p.as_str().to_string()),
        os_version,
        device_type: info.device_type,
        ip: conn.remote_addr.map(format_ip),
        user_agent,
        landing_page: Some(conn.path.clone()).filter(|p| !p.is_empty()),
        utm_campaign,
        utm_content,
        utm_medium,
        utm_source,
        utm_term,
    }
}
