use serde::{Deserialize, Serialize};

use crate::models::Role;

/// An authenticated session. Credential and role live in one value so they
/// are always set and cleared together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub credential: String,
    pub role: Role,
    /// Refresh token from the last login. Never persisted.
    #[serde(skip)]
    pub refresh: Option<String>,
}

impl Session {
    pub fn new(credential: impl Into<String>, role: Role) -> Self {
        Self {
            credential: credential.into(),
            role,
            refresh: None,
        }
    }

    pub fn with_refresh(mut self, refresh: Option<String>) -> Self {
        self.refresh = refresh;
        self
    }
}
