use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use aits_client::ClientError;
use aits_client::api::ApiGateway;
use aits_client::models::{
    AuditLog, AuthResponse, Course, Issue, IssueStatus, NewIssueRequest, Notification,
    RefreshResponse, Role, SignupRequest, Stats, UpdateIssueRequest, User,
};

use super::user;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    Network,
    Validation,
    AuthExpired,
}

impl Failure {
    fn to_error(self) -> ClientError {
        match self {
            Failure::Network => ClientError::Network("connection refused".to_string()),
            Failure::Validation => ClientError::Validation("rejected".to_string()),
            Failure::AuthExpired => ClientError::AuthExpired,
        }
    }
}

/// In-memory stand-in for the REST API.
#[derive(Default)]
pub struct FakeState {
    pub accounts: HashMap<String, (String, Role)>,
    pub issues: Vec<Issue>,
    pub notifications: Vec<Notification>,
    pub stats: Stats,
    pub courses: Vec<Course>,
    pub staff: Vec<User>,
    pub audit_logs: Vec<AuditLog>,
    /// Created issues are kept here instead of in `issues` while set.
    pub hide_created: bool,
    pub hidden: Vec<Issue>,
    /// Writes succeed but are not reflected in later reads.
    pub ignore_writes: bool,
    pub fail_writes: Option<Failure>,
    pub fail_reads: Option<Failure>,
    pub fail_refresh: bool,
    pub read_delay: Duration,
    pub write_delay: Duration,
    pub next_issue_id: i64,
    pub calls: HashMap<&'static str, usize>,
}

pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        let mut state = FakeState {
            next_issue_id: 100,
            ..FakeState::default()
        };
        state
            .accounts
            .insert("student@uni.ac.ug".to_string(), ("secret".to_string(), Role::Student));
        state
            .accounts
            .insert("hod@uni.ac.ug".to_string(), ("secret".to_string(), Role::HeadOfDepartment));
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state().calls.get(name).copied().unwrap_or(0)
    }

    fn record(&self, name: &'static str) -> (Duration, Duration) {
        let mut state = self.state();
        *state.calls.entry(name).or_insert(0) += 1;
        (state.read_delay, state.write_delay)
    }

    /// The response is computed when the request arrives and delivered after
    /// `read_delay`, so a slow read can carry data older than a later write.
    async fn read<T>(&self, name: &'static str, f: impl FnOnce(&FakeState) -> T) -> Result<T, ClientError> {
        let (delay, _) = self.record(name);
        let result = {
            let state = self.state();
            match state.fail_reads {
                Some(failure) => Err(failure.to_error()),
                None => Ok(f(&state)),
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn write<T>(
        &self,
        name: &'static str,
        f: impl FnOnce(&mut FakeState) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let (_, delay) = self.record(name);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        if let Some(failure) = state.fail_writes {
            return Err(failure.to_error());
        }
        f(&mut state)
    }

    fn auth_response(email: &str, role: Role) -> AuthResponse {
        AuthResponse {
            access: format!("tok-{}", email),
            refresh: Some(format!("ref-{}", email)),
            user: user(1, email, role),
        }
    }
}

#[async_trait]
impl ApiGateway for FakeApi {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        self.record("login");
        let state = self.state();
        match state.accounts.get(email) {
            Some((expected, role)) if expected == password => Ok(Self::auth_response(email, role.clone())),
            _ => Err(ClientError::Auth("No active account found with the given credentials".to_string())),
        }
    }

    async fn refresh_token(&self, refresh: &str) -> Result<RefreshResponse, ClientError> {
        self.record("refresh_token");
        if self.state().fail_refresh {
            return Err(ClientError::AuthExpired);
        }
        Ok(RefreshResponse {
            access: format!("{}-renewed", refresh.trim_start_matches("ref-")),
            refresh: None,
        })
    }

    async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse, ClientError> {
        self.record("signup");
        let mut state = self.state();
        if state.accounts.contains_key(&req.email) {
            return Err(ClientError::Conflict(format!("{} already registered", req.email)));
        }
        state
            .accounts
            .insert(req.email.clone(), (req.password.clone(), Role::Student));
        Ok(Self::auth_response(&req.email, Role::Student))
    }

    async fn list_issues(&self) -> Result<Vec<Issue>, ClientError> {
        self.read("list_issues", |s| s.issues.clone()).await
    }

    async fn get_stats(&self) -> Result<Stats, ClientError> {
        self.read("get_stats", |s| s.stats.clone()).await
    }

    async fn list_courses(&self) -> Result<Vec<Course>, ClientError> {
        self.read("list_courses", |s| s.courses.clone()).await
    }

    async fn list_staff(&self) -> Result<Vec<User>, ClientError> {
        self.read("list_staff", |s| s.staff.clone()).await
    }

    async fn create_issue(&self, req: &NewIssueRequest) -> Result<Issue, ClientError> {
        self.write("create_issue", |s| {
            let id = s.next_issue_id;
            s.next_issue_id += 1;
            let course = s
                .courses
                .iter()
                .find(|c| c.course_id == req.course)
                .cloned()
                .ok_or_else(|| ClientError::Validation("unknown course".to_string()))?;
            let now = Utc::now();
            let created = Issue {
                issue_id: id,
                student: Some(user(100, "student@uni.ac.ug", Role::Student)),
                course,
                issue_type: req.issue_type,
                description: req.description.clone(),
                status: IssueStatus::Open,
                created_at: now,
                updated_at: now,
                assigned_to: None,
            };
            if s.hide_created {
                s.hidden.push(created.clone());
            } else if !s.ignore_writes {
                s.issues.push(created.clone());
            }
            Ok(created)
        })
        .await
    }

    async fn update_issue(&self, id: i64, req: &UpdateIssueRequest) -> Result<Issue, ClientError> {
        self.write("update_issue", |s| {
            let staff = req
                .assigned_to
                .and_then(|staff_id| s.staff.iter().find(|u| u.id == Some(staff_id)).cloned());
            let ignore = s.ignore_writes;
            let issue = s
                .issues
                .iter_mut()
                .find(|i| i.issue_id == id)
                .ok_or(ClientError::NotFound)?;
            let mut updated = issue.clone();
            if let Some(status) = &req.status {
                updated.status = status.clone();
            }
            if staff.is_some() {
                updated.assigned_to = staff;
            }
            if !ignore {
                *issue = updated.clone();
            }
            Ok(updated)
        })
        .await
    }

    async fn list_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.read("list_notifications", |s| s.notifications.clone()).await
    }

    async fn mark_notification_read(&self, id: i64) -> Result<(), ClientError> {
        self.write("mark_notification_read", |s| {
            let ignore = s.ignore_writes;
            let notification = s
                .notifications
                .iter_mut()
                .find(|n| n.notification_id == id)
                .ok_or(ClientError::NotFound)?;
            if !ignore {
                notification.is_read = true;
            }
            Ok(())
        })
        .await
    }

    async fn list_audit_logs(&self) -> Result<Vec<AuditLog>, ClientError> {
        self.read("list_audit_logs", |s| s.audit_logs.clone()).await
    }
}
