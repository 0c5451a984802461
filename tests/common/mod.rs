#![allow(dead_code)]

pub mod fake_api;
pub mod fake_server;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use aits_client::api::ApiGateway;
use aits_client::models::{
    AuditLog, Course, Issue, IssueStatus, IssueType, Notification, Role, Session, User,
};
use aits_client::session::{MemorySessionStorage, SessionStore};
use aits_client::{AppState, ClientConfig};

pub fn user(id: i64, email: &str, role: Role) -> User {
    User {
        id: Some(id),
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: format!("User{}", id),
        phone: None,
        role,
        college: Some(1),
        department: Some(1),
    }
}

pub fn course(id: i64) -> Course {
    Course {
        course_id: id,
        course_code: format!("CSC{}", 1000 + id),
        course_name: format!("Course {}", id),
        department: Some(1),
    }
}

pub fn issue(id: i64, status: IssueStatus) -> Issue {
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    Issue {
        issue_id: id,
        student: Some(user(100, "student@uni.ac.ug", Role::Student)),
        course: course(1),
        issue_type: IssueType::MissingMarks,
        description: format!("Issue {}", id),
        status,
        created_at: at,
        updated_at: at,
        assigned_to: None,
    }
}

pub fn notification(id: i64, is_read: bool) -> Notification {
    Notification {
        notification_id: id,
        user: Some(100),
        issue: Some(1),
        message: format!("Notification {}", id),
        sent_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
        method: None,
        is_read,
    }
}

pub fn audit_log(id: i64, action: &str) -> AuditLog {
    AuditLog {
        log_id: id,
        issue: 1,
        user: user(100, "student@uni.ac.ug", Role::Student),
        action: action.to_string(),
        action_timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap(),
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        poll_interval: Duration::from_millis(100),
        mutation_timeout: Duration::from_millis(1000),
        network_error_threshold: 3,
        ..ClientConfig::default()
    }
}

/// App state over an in-memory session signed in as `role`.
pub fn signed_in_state(api: Arc<dyn ApiGateway>, role: Role) -> (AppState, Arc<MemorySessionStorage>) {
    let storage = Arc::new(MemorySessionStorage::with_session("tok-test", role.as_str()));
    let session = SessionStore::new(storage.clone());
    (AppState::new(test_config(), session, api), storage)
}

pub async fn restore(state: &AppState) -> Session {
    state
        .session
        .restore()
        .await
        .expect("restore failed")
        .expect("no session restored")
}
