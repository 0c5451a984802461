use std::env;
use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";
pub const DEFAULT_SESSION_DB: &str = "sqlite://aits_session.db";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base of every REST path. Always ends with `/`.
    pub api_base_url: String,
    pub session_db_url: String,
    pub poll_interval: Duration,
    pub mutation_timeout: Duration,
    /// Consecutive transient poll failures before one is reported.
    pub network_error_threshold: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_db_url: DEFAULT_SESSION_DB.to_string(),
            poll_interval: Duration::from_millis(5000),
            mutation_timeout: Duration::from_millis(30_000),
            network_error_threshold: 3,
        }
    }
}

impl ClientConfig {
    pub fn new_from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let api_base_url = env::var("AITS_API_BASE_URL").unwrap_or(defaults.api_base_url);
        let session_db_url = env::var("AITS_SESSION_DB").unwrap_or(defaults.session_db_url);

        let poll_interval = read_millis("AITS_POLL_INTERVAL_MS")?.unwrap_or(defaults.poll_interval);
        let mutation_timeout =
            read_millis("AITS_MUTATION_TIMEOUT_MS")?.unwrap_or(defaults.mutation_timeout);

        let network_error_threshold = match env::var("AITS_NETWORK_ERROR_THRESHOLD") {
            Ok(raw) => raw.parse::<u32>().map_err(|_| {
                ClientError::Config(format!("AITS_NETWORK_ERROR_THRESHOLD is not a number: {}", raw))
            })?,
            Err(_) => defaults.network_error_threshold,
        };

        Self {
            api_base_url,
            session_db_url,
            poll_interval,
            mutation_timeout,
            network_error_threshold,
        }
        .validated()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base_url = base_url.into();
        self
    }

    fn validated(mut self) -> Result<Self, ClientError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ClientError::Config("AITS_API_BASE_URL is empty".to_string()));
        }
        if !self.api_base_url.ends_with('/') {
            self.api_base_url.push('/');
        }
        if self.poll_interval.is_zero() {
            return Err(ClientError::Config("poll interval must be positive".to_string()));
        }
        if self.network_error_threshold == 0 {
            self.network_error_threshold = 1;
        }
        Ok(self)
    }
}

fn read_millis(key: &str) -> Result<Option<Duration>, ClientError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ClientError::Config(format!("{} is not a number of milliseconds: {}", key, raw))),
        Err(_) => Ok(None),
    }
}
