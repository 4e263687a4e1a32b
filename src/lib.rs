//! Session and event tracking middleware for axum applications.
//!
//! Every request is tied to a durable session carried in a cookie. Sessions
//! start anonymous and are identified once the embedding application can name
//! the user. Requests and custom events are recorded against the session
//! through a pluggable [`repositories::store::Store`].

pub mod config;
pub mod db;
pub mod error;
pub mod router;
pub mod state;

pub mod models {
    pub mod attributes;
    pub mod connection;
    pub mod event;
    pub mod session;
}

pub mod repositories {
    pub mod memory;
    pub mod postgres;
    pub mod redis;
    pub mod store;
}

pub mod services {
    pub mod events;
    pub mod identify;
    pub mod identity;
    pub mod parser;
    pub mod tracker;
    pub mod user_agent;
}

pub mod handlers {
    pub mod events;
    pub mod sessions;
}

pub mod middleware_layer {
    pub mod tracking;
}

pub mod validation {
    pub mod events;
}
