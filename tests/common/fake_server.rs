use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use aits_client::models::{Issue, IssueStatus, Notification, Stats};

use super::{issue, notification};

/// State behind the in-process REST fake.
#[derive(Default)]
pub struct ServerState {
    pub valid_tokens: Vec<String>,
    pub issues: Vec<Issue>,
    pub notifications: Vec<Notification>,
    pub stats: Stats,
    /// Authorization header of every request, in arrival order.
    pub seen_auth: Vec<(String, Option<String>)>,
    pub marked_read: Vec<i64>,
    pub patches: Vec<(i64, Value)>,
    /// Serve an unparseable issue list.
    pub garbage_issues: bool,
}

pub type Shared = Arc<Mutex<ServerState>>;

pub fn default_state() -> Shared {
    Arc::new(Mutex::new(ServerState {
        valid_tokens: vec!["tok-student".to_string(), "tok-hod".to_string()],
        issues: vec![issue(5, IssueStatus::Open), issue(6, IssueStatus::Assigned)],
        notifications: vec![notification(42, false)],
        stats: Stats {
            total_issues: 2,
            open_issues: 1,
            overdue_issues: 0,
            resolved_issues: 0,
            avg_resolution_time: 0,
        },
        ..ServerState::default()
    }))
}

/// Serves the fake on an ephemeral port and returns its API base URL.
pub async fn spawn(state: Shared) -> String {
    let app = Router::new()
        .route("/api/token/", post(token))
        .route("/api/token/refresh/", post(refresh))
        .route("/api/register/", post(register))
        .route("/api/issues/", get(list_issues).post(create_issue))
        .route("/api/issues/stats/", get(stats))
        .route("/api/issues/courses/", get(courses))
        .route("/api/issues/staff/", get(staff))
        .route("/api/issues/{id}/", patch(update_issue))
        .route("/api/notifications/", get(list_notifications))
        .route("/api/notifications/{id}/mark_as_read/", post(mark_as_read))
        .route("/api/audit-logs/", get(audit_logs))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake server");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake server failed");
    });

    format!("http://{}/api/", addr)
}

fn token_not_valid() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })),
    )
        .into_response()
}

/// Records the header and checks the bearer token.
fn authorize(state: &Shared, path: &str, headers: &HeaderMap) -> bool {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mut s = state.lock().unwrap();
    s.seen_auth.push((path.to_string(), header.clone()));
    match header.as_deref().and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => s.valid_tokens.iter().any(|t| t == token),
        None => false,
    }
}

fn user_json(email: &str, role: &str) -> Value {
    json!({
        "id": 1,
        "email": email,
        "first_name": "Test",
        "last_name": "User",
        "phone": null,
        "role": role,
        "college": 1,
        "department": null
    })
}

async fn token(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    authorize(&state, "token/", &headers);
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let role = match (email, password) {
        ("student@uni.ac.ug", "secret") => "Student",
        ("hod@uni.ac.ug", "secret") => "HeadOfDepartment",
        ("ghost@uni.ac.ug", "secret") => "Janitor",
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "No active account found with the given credentials"})),
            )
                .into_response();
        }
    };
    let short = email.split('@').next().unwrap_or_default();
    Json(json!({
        "refresh": format!("ref-{}", short),
        "access": format!("tok-{}", short),
        "user": user_json(email, role)
    }))
    .into_response()
}

async fn refresh(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    match body["refresh"].as_str() {
        Some("ref-student") => {
            state.lock().unwrap().valid_tokens.push("tok-student-2".to_string());
            Json(json!({"access": "tok-student-2"})).into_response()
        }
        _ => token_not_valid(),
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    match email {
        "taken@uni.ac.ug" => (
            StatusCode::BAD_REQUEST,
            Json(json!({"email": ["user with this email already exists."]})),
        )
            .into_response(),
        "race@uni.ac.ug" => (StatusCode::CONFLICT, Json(json!({"detail": "duplicate"}))).into_response(),
        _ => (
            StatusCode::CREATED,
            Json(json!({
                "refresh": "ref-new",
                "access": "tok-new",
                "user": {
                    "email": email,
                    "first_name": body["first_name"],
                    "last_name": body["last_name"],
                    "role": "Student"
                }
            })),
        )
            .into_response(),
    }
}

async fn list_issues(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorize(&state, "issues/", &headers) {
        return token_not_valid();
    }
    let s = state.lock().unwrap();
    if s.garbage_issues {
        return Json(json!({"unexpected": true})).into_response();
    }
    Json(s.issues.clone()).into_response()
}

async fn create_issue(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorize(&state, "issues/", &headers) {
        return token_not_valid();
    }
    let mut s = state.lock().unwrap();
    let mut created = issue(7, IssueStatus::Open);
    created.description = body["description"].as_str().unwrap_or_default().to_string();
    s.issues.push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn stats(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorize(&state, "issues/stats/", &headers) {
        return token_not_valid();
    }
    Json(state.lock().unwrap().stats.clone()).into_response()
}

async fn courses(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorize(&state, "issues/courses/", &headers) {
        return token_not_valid();
    }
    Json(json!([{"course_id": 1, "course_code": "CSC1100", "course_name": "Programming", "department": 1}]))
        .into_response()
}

async fn staff(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorize(&state, "issues/staff/", &headers) {
        return token_not_valid();
    }
    Json(json!([user_json("lecturer@uni.ac.ug", "Lecturer")])).into_response()
}

async fn update_issue(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorize(&state, "issues/{id}/", &headers) {
        return token_not_valid();
    }
    let mut s = state.lock().unwrap();
    s.patches.push((id, body.clone()));
    let Some(issue) = s.issues.iter_mut().find(|i| i.issue_id == id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    };
    if let Some(status) = body["status"].as_str() {
        issue.status = IssueStatus::from(status.to_string());
    }
    Json(issue.clone()).into_response()
}

async fn list_notifications(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorize(&state, "notifications/", &headers) {
        return token_not_valid();
    }
    Json(state.lock().unwrap().notifications.clone()).into_response()
}

async fn mark_as_read(State(state): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if !authorize(&state, "notifications/{id}/mark_as_read/", &headers) {
        return token_not_valid();
    }
    let mut s = state.lock().unwrap();
    s.marked_read.push(id);
    if let Some(n) = s.notifications.iter_mut().find(|n| n.notification_id == id) {
        n.is_read = true;
    }
    Json(json!({"status": "marked as read"})).into_response()
}

async fn audit_logs(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorize(&state, "audit-logs/", &headers) {
        return token_not_valid();
    }
    Json(json!([{
        "log_id": 1,
        "issue": 5,
        "user": user_json("student@uni.ac.ug", "Student"),
        "action": "Issue Created",
        "action_timestamp": "2025-03-01T11:00:00Z"
    }]))
    .into_response()
}
