use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

use courierbot_core::domain::Session;

use crate::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("session decode error: {0}")]
    Decode(String),
    #[error("session encode error: {0}")]
    Encode(String),
}

/// Key-value session store, one snapshot per user id. Consistency contract
/// is read-your-own-writes per user only; the surrounding runner serializes
/// messages per user.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, user_id: i64) -> Result<Option<Session>, RepositoryError>;
    async fn put(&self, user_id: i64, session: &Session) -> Result<(), RepositoryError>;
    async fn delete(&self, user_id: i64) -> Result<(), RepositoryError>;
}

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn get(&self, user_id: i64) -> Result<Option<Session>, RepositoryError> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM sessions WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        payload
            .map(|blob| {
                serde_json::from_str(&blob)
                    .map_err(|error| RepositoryError::Decode(error.to_string()))
            })
            .transpose()
    }

    async fn put(&self, user_id: i64, session: &Session) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(session)
            .map_err(|error| RepositoryError::Encode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO sessions (user_id, payload, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET \
             payload = excluded.payload, updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, user_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<i64, Session>>,
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get(&self, user_id: i64) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&user_id).cloned())
    }

    async fn put(&self, user_id: i64, session: &Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(user_id, session.clone());
        Ok(())
    }

    async fn delete(&self, user_id: i64) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&user_id);
        Ok(())
    }
}
