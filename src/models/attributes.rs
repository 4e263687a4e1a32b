use serde::Serialize;
use serde_json::Value;

use crate::models::session::Properties;

/// The five recognized campaign-attribution query parameters.
pub const UTM_KEYS: [&str; 5] = [
    "utm_campaign",
    "utm_content",
    "utm_medium",
    "utm_source",
    "utm_term",
];

/// Attributes parsed from a single inbound request. Never mutated after parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionAttributes {
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub device_type: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub landing_page: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_content: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_source: Option<String>,
    pub utm_term: Option<String>,
}

impl SessionAttributes {
    fn derived(&self) -> [(&'static str, &Option<String>); 8] {
        [
            ("browser", &self.browser),
            ("browser_version", &self.browser_version),
            ("os", &self.os),
            ("os_version", &self.os_version),
            ("device_type", &self.device_type),
            ("ip", &self.ip),
            ("user_agent", &self.user_agent),
            ("landing_page", &self.landing_page),
        ]
    }

    fn utm(&self) -> [(&'static str, &Option<String>); 5] {
        [
            ("utm_campaign", &self.utm_campaign),
            ("utm_content", &self.utm_content),
            ("utm_medium", &self.utm_medium),
            ("utm_source", &self.utm_source),
            ("utm_term", &self.utm_term),
        ]
    }

    /// Flattens the attributes into a property map.
    ///
    /// Absent fields are omitted. Campaign parameters are merged underneath the
    /// derived fields, so a derived key always wins a collision.
    pub fn to_properties(&self) -> Properties {
        let mut properties = Properties::new();

        for (key, value) in self.derived() {
            if let Some(v) = value {
                properties.insert(key.to_string(), Value::String(v.clone()));
            }
        }

        for (key, value) in self.utm() {
            if let Some(v) = value {
                properties
                    .entry(key.to_string())
                    .or_insert_with(|| Value::String(v.clone()));
            }
        }

        properties
    }
}
