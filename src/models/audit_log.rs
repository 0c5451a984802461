use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub log_id: i64,
    pub issue: i64,
    pub user: User,
    pub action: String,
    pub action_timestamp: DateTime<Utc>,
}
