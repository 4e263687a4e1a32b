use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use serde_json::Value;
use tokio_postgres::Row;

use crate::{
    error::{AppError, Result},
    models::{
        event::Event,
        session::{Id, Properties, Session, SessionPatch},
    },
    repositories::store::Store,
};

/// A [`Store`] backed by PostgreSQL through a deadpool connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn properties_from(value: Value) -> Properties {
    match value {
        Value::Object(map) => map,
        _ => Properties::new(),
    }
}

/// A helper function to map a `tokio_postgres::Row` to a `Session`.
fn row_to_session(row: &Row) -> Result<Session> {
    let id: i64 = row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?;
    let properties: Value = row
        .try_get("properties")
        .map_err(|_| AppError::MissingData("properties".to_string()))?;
    let inserted_at: DateTime<Utc> = row
        .try_get("inserted_at")
        .map_err(|_| AppError::MissingData("inserted_at".to_string()))?;

    Ok(Session {
        id: Id::Int(id),
        user_id: row.try_get("user_id").map_err(|_| AppError::MissingData("user_id".to_string()))?,
        properties: properties_from(properties),
        inserted_at,
    })
}

/// A helper function to map a `tokio_postgres::Row` to an `Event`.
fn row_to_event(row: &Row) -> Result<Event> {
    let id: i64 = row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?;
    let session_id: Option<i64> = row
        .try_get("session_id")
        .map_err(|_| AppError::MissingData("session_id".to_string()))?;
    let properties: Value = row
        .try_get("properties")
        .map_err(|_| AppError::MissingData("properties".to_string()))?;

    Ok(Event {
        id: Id::Int(id),
        session_id: session_id.map(Id::Int),
        name: row.try_get("name").map_err(|_| AppError::MissingData("name".to_string()))?,
        properties: properties_from(properties),
        inserted_at: row
            .try_get("inserted_at")
            .map_err(|_| AppError::MissingData("inserted_at".to_string()))?,
    })
}

fn numeric_id(id: &Id) -> Result<i64> {
    id.as_int()
        .ok_or_else(|| AppError::Validation(format!("Invalid record id: {}", id)))
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_session(
        &self,
        user_id: Option<String>,
        properties: Properties,
    ) -> Result<Session> {
        let client = self.pool.get().await?;
        let properties = Value::Object(properties);
        let row = client
            .query_one(
                r#"
                INSERT INTO lear_sessions (user_id, properties)
                VALUES ($1, $2)
                RETURNING id, user_id, properties, inserted_at
                "#,
                &[&user_id, &properties],
            )
            .await?;
        row_to_session(&row)
    }

    async fn update_session(&self, session: &Session, patch: SessionPatch) -> Result<Session> {
        let id = numeric_id(&session.id)?;
        let client = self.pool.get().await?;
        // COALESCE keeps the first identified user when two requests race.
        let row = client
            .query_opt(
                r#"
                UPDATE lear_sessions
                SET user_id = COALESCE(user_id, $2)
                WHERE id = $1
                RETURNING id, user_id, properties, inserted_at
                "#,
                &[&id, &patch.user_id],
            )
            .await?
            .ok_or(AppError::NotFound)?;
        row_to_session(&row)
    }

    async fn get_session(&self, id: &Id) -> Result<Option<Session>> {
        let Some(id) = id.as_int() else {
            return Ok(None);
        };
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, user_id, properties, inserted_at
                FROM lear_sessions
                WHERE id = $1
                "#,
                &[&id],
            )
            .await?;
        row.map(|r| row_to_session(&r)).transpose()
    }

    async fn save_event(
        &self,
        session_id: Option<&Id>,
        name: &str,
        properties: Properties,
    ) -> Result<Event> {
        let session_id = session_id.map(numeric_id).transpose()?;
        let client = self.pool.get().await?;
        let properties = Value::Object(properties);
        let row = client
            .query_one(
                r#"
                INSERT INTO lear_events (session_id, name, properties)
                VALUES ($1, $2, $3)
                RETURNING id, session_id, name, properties, inserted_at
                "#,
                &[&session_id, &name, &properties],
            )
            .await?;
        row_to_event(&row)
    }

    async fn get_event(&self, id: &Id) -> Result<Option<Event>> {
        let Some(id) = id.as_int() else {
            return Ok(None);
        };
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, session_id, name, properties, inserted_at
                FROM lear_events
                WHERE id = $1
                "#,
                &[&id],
            )
            .await?;
        row.map(|r| row_to_event(&r)).transpose()
    }
}
