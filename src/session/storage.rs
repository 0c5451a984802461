use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::warn;

use crate::db::repository;
use crate::error::ClientError;
use crate::models::{Role, Session};

/// Durable home of the session across process restarts.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load(&self) -> Result<Option<Session>, ClientError>;
    async fn save(&self, session: &Session) -> Result<(), ClientError>;
    async fn clear(&self) -> Result<(), ClientError>;
}

pub struct SqliteSessionStorage {
    db: SqlitePool,
}

impl SqliteSessionStorage {
    pub async fn connect(database_url: &str) -> Result<Self, ClientError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::from_pool(db).await
    }

    pub async fn from_pool(db: SqlitePool) -> Result<Self, ClientError> {
        sqlx::migrate!("./migrations").run(&db).await?;
        Ok(Self { db })
    }
}

#[async_trait]
impl SessionStorage for SqliteSessionStorage {
    async fn load(&self) -> Result<Option<Session>, ClientError> {
        let Some(row) = repository::fetch_session(&self.db).await? else {
            return Ok(None);
        };

        if row.credential.is_empty() || row.role.is_empty() {
            warn!("Discarding incomplete persisted session (saved {})", row.updated_at);
            repository::clear_session(&self.db).await?;
            return Ok(None);
        }

        Ok(Some(Session::new(row.credential, Role::from(row.role))))
    }

    async fn save(&self, session: &Session) -> Result<(), ClientError> {
        repository::save_session(&self.db, &session.credential, session.role.as_str()).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        repository::clear_session(&self.db).await?;
        Ok(())
    }
}

/// Process-local storage for tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySessionStorage {
    slot: Mutex<Option<(String, String)>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(credential: &str, role: &str) -> Self {
        Self {
            slot: Mutex::new(Some((credential.to_string(), role.to_string()))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot().is_none()
    }

    fn slot(&self) -> MutexGuard<'_, Option<(String, String)>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn load(&self) -> Result<Option<Session>, ClientError> {
        Ok(self
            .slot()
            .as_ref()
            .filter(|(credential, role)| !credential.is_empty() && !role.is_empty())
            .map(|(credential, role)| Session::new(credential.clone(), Role::from(role.as_str()))))
    }

    async fn save(&self, session: &Session) -> Result<(), ClientError> {
        *self.slot() = Some((session.credential.clone(), session.role.to_string()));
        Ok(())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        *self.slot() = None;
        Ok(())
    }
}
