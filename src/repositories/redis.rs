use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;

use crate::{
    error::{AppError, Result},
    models::{
        event::Event,
        session::{Id, Properties, Session, SessionPatch},
    },
    repositories::store::Store,
};

const SESSION_SEQ_KEY: &str = "lear:session:next_id";
const EVENT_SEQ_KEY: &str = "lear:event:next_id";

fn session_key(id: &Id) -> String {
    format!("lear:session:{}", id)
}

fn event_key(id: &Id) -> String {
    format!("lear:event:{}", id)
}

/// A [`Store`] backed by Redis hashes.
///
/// Ids come from `INCR` counters. Identification uses `HSETNX`, so the first
/// user written to a session is never replaced.
#[derive(Clone)]
pub struct RedisStore {
    redis: ConnectionManager,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| AppError::MissingData(name.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Serialization(format!("Invalid timestamp '{}': {}", raw, e)))
}

fn hash_to_session(id: &Id, fields: &HashMap<String, String>) -> Result<Session> {
    Ok(Session {
        id: id.clone(),
        user_id: fields.get("user_id").cloned(),
        properties: sonic_rs::from_str(required(fields, "properties")?)?,
        inserted_at: parse_timestamp(required(fields, "inserted_at")?)?,
    })
}

fn hash_to_event(id: &Id, fields: &HashMap<String, String>) -> Result<Event> {
    Ok(Event {
        id: id.clone(),
        session_id: fields.get("session_id").and_then(|s| Id::from_token(s)),
        name: required(fields, "name")?.to_string(),
        properties: sonic_rs::from_str(required(fields, "properties")?)?,
        inserted_at: parse_timestamp(required(fields, "inserted_at")?)?,
    })
}

#[async_trait]
impl Store for RedisStore {
    async fn create_session(
        &self,
        user_id: Option<String>,
        properties: Properties,
    ) -> Result<Session> {
        let mut redis = self.redis.clone();
        let id = Id::Int(redis.incr(SESSION_SEQ_KEY, 1).await?);
        let inserted_at = Utc::now();

        let mut fields = vec![
            ("properties", sonic_rs::to_string(&properties)?),
            ("inserted_at", inserted_at.to_rfc3339()),
        ];
        if let Some(user_id) = &user_id {
            fields.push(("user_id", user_id.clone()));
        }

        let _: () = redis.hset_multiple(session_key(&id), fields.as_slice()).await?;
        tracing::debug!("Session stored in Redis: {}", session_key(&id));

        Ok(Session {
            id,
            user_id,
            properties,
            inserted_at,
        })
    }

    async fn update_session(&self, session: &Session, patch: SessionPatch) -> Result<Session> {
        let mut redis = self.redis.clone();
        let key = session_key(&session.id);

        let exists: bool = redis.exists(&key).await?;
        if !exists {
            return Err(AppError::NotFound);
        }

        if let Some(user_id) = patch.user_id {
            let written: bool = redis.hset_nx(&key, "user_id", user_id).await?;
            if !written {
                tracing::debug!("Session {} was already identified, keeping first user", session.id);
            }
        }

        let fields: HashMap<String, String> = redis.hgetall(&key).await?;
        hash_to_session(&session.id, &fields)
    }

    async fn get_session(&self, id: &Id) -> Result<Option<Session>> {
        let mut redis = self.redis.clone();
        let fields: HashMap<String, String> = redis.hgetall(session_key(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        hash_to_session(id, &fields).map(Some)
    }

    async fn save_event(
        &self,
        session_id: Option<&Id>,
        name: &str,
        properties: Properties,
    ) -> Result<Event> {
        let mut redis = self.redis.clone();
        let id = Id::Int(redis.incr(EVENT_SEQ_KEY, 1).await?);
        let inserted_at = Utc::now();

        let mut fields = vec![
            ("name", name.to_string()),
            ("properties", sonic_rs::to_string(&properties)?),
            ("inserted_at", inserted_at.to_rfc3339()),
        ];
        if let Some(session_id) = session_id {
            fields.push(("session_id", session_id.to_token()));
        }

        let _: () = redis.hset_multiple(event_key(&id), fields.as_slice()).await?;

        Ok(Event {
            id,
            session_id: session_id.cloned(),
            name: name.to_string(),
            properties,
            inserted_at,
        })
    }

    async fn get_event(&self, id: &Id) -> Result<Option<Event>> {
        let mut redis = self.redis.clone();
        let fields: HashMap<String, String> = redis.hgetall(event_key(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        hash_to_event(id, &fields).map(Some)
    }
}
