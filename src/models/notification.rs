use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::reconciler::Reconcilable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMethod {
    Email,
    InApp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: i64,
    #[serde(default)]
    pub user: Option<i64>,
    #[serde(default)]
    pub issue: Option<i64>,
    pub message: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub method: Option<DeliveryMethod>,
    pub is_read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPatch {
    pub is_read: bool,
}

impl NotificationPatch {
    pub fn mark_read() -> Self {
        Self { is_read: true }
    }
}

impl Reconcilable for Notification {
    type Id = i64;
    type Patch = NotificationPatch;

    fn id(&self) -> i64 {
        self.notification_id
    }

    fn apply(&mut self, patch: &NotificationPatch) {
        self.is_read = patch.is_read;
    }

    fn reflects(&self, patch: &NotificationPatch) -> bool {
        self.is_read == patch.is_read
    }
}
