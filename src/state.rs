use std::sync::Arc;

use crate::api::{ApiGateway, HttpApiGateway};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::{SessionStore, SqliteSessionStorage};

/// Process-wide collaborators, created once at startup and handed to
/// dashboards by reference.
#[derive(Clone)]
pub struct AppState {
    pub config: ClientConfig,
    pub session: SessionStore,
    pub api: Arc<dyn ApiGateway>,
}

impl AppState {
    pub fn new(config: ClientConfig, session: SessionStore, api: Arc<dyn ApiGateway>) -> Self {
        Self {
            config,
            session,
            api,
        }
    }

    /// SQLite-backed session and the HTTP gateway. Does not restore the
    /// session; call `session.restore()` once the state exists.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let storage = Arc::new(SqliteSessionStorage::connect(&config.session_db_url).await?);
        let session = SessionStore::new(storage);
        let api = Arc::new(HttpApiGateway::new(&config, session.clone())?);
        Ok(Self::new(config, session, api))
    }
}
