use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::error::{AppError, Result};
use crate::repositories::{postgres::PostgresStore, redis::RedisStore, store::Store};
use crate::services::{identify, tracker::Tracker};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The tracker shared by the middleware and the handlers.
    pub tracker: Tracker,
}

impl AppState {
    /// Creates a new `AppState` around an already configured tracker.
    pub fn with_tracker(tracker: Tracker) -> Self {
        Self { tracker }
    }

    /// Creates a new `AppState`.
    ///
    /// Connects the configured store backend. Fails if it cannot be reached,
    /// so the server never runs without a store.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn Store> = match config.store_backend {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| AppError::Internal("DATABASE_URL is not configured".to_string()))?;
                let db = crate::db::create_pool(url)?;
                crate::db::migrate(&db).await?;
                tracing::info!("✅ PostgreSQL store initialized with deadpool-postgres");
                Arc::new(PostgresStore::new(db))
            }
            StoreBackend::Redis => {
                let url = config
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| AppError::Internal("REDIS_URL is not configured".to_string()))?;
                let redis_client = redis::Client::open(url)?;
                let redis = ConnectionManager::new(redis_client).await?;
                tracing::info!("✅ Redis store initialized (connection manager)");
                Arc::new(RedisStore::new(redis))
            }
        };

        let identifier = identify::identifier_for(config.identity_header.as_deref())
            .map_err(|e| AppError::Validation(format!("Invalid LEAR_IDENTITY_HEADER: {}", e)))?;
        match &config.identity_header {
            Some(header) => tracing::warn!(
                "⚠️ Identifying users from the '{}' header; it must be set by a trusted upstream layer",
                header
            ),
            None => tracing::info!("Identity header disabled, sessions stay anonymous"),
        }

        let tracker = Tracker::new(store, identifier, config.tracking.clone());
        tracing::info!(
            "✅ Tracker initialized (cookie: {}, methods: {:?})",
            config.tracking.cookie_name,
            config.tracking.trackable_methods
        );

        Ok(Self::with_tracker(tracker))
    }
}
