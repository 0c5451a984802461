use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Course, User};
use crate::services::reconciler::Reconcilable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueType {
    MissingMarks,
    Appeals,
    Corrections,
}

/// Issue workflow status. Values this client does not know are preserved
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueStatus {
    Open,
    Assigned,
    InProgress,
    Resolved,
    Closed,
    Other(String),
}

impl IssueStatus {
    pub fn as_str(&self) -> &str {
        match self {
            IssueStatus::Open => "Open",
            IssueStatus::Assigned => "Assigned",
            IssueStatus::InProgress => "InProgress",
            IssueStatus::Resolved => "Resolved",
            IssueStatus::Closed => "Closed",
            IssueStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for IssueStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Open" => IssueStatus::Open,
            "Assigned" => IssueStatus::Assigned,
            "InProgress" => IssueStatus::InProgress,
            "Resolved" => IssueStatus::Resolved,
            "Closed" => IssueStatus::Closed,
            _ => IssueStatus::Other(raw),
        }
    }
}

impl From<IssueStatus> for String {
    fn from(status: IssueStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub issue_id: i64,
    #[serde(default)]
    pub student: Option<User>,
    pub course: Course,
    pub issue_type: IssueType,
    pub description: String,
    pub status: IssueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub assigned_to: Option<User>,
}

impl Issue {
    /// Local stand-in shown while a create request is unconfirmed. Drafts
    /// carry id 0, which the server never assigns.
    pub fn draft(course: Course, req: &NewIssueRequest) -> Self {
        let now = Utc::now();
        Self {
            issue_id: 0,
            student: None,
            course,
            issue_type: req.issue_type,
            description: req.description.clone(),
            status: IssueStatus::Open,
            created_at: now,
            updated_at: now,
            assigned_to: None,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.issue_id == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIssueRequest {
    pub course: i64,
    pub issue_type: IssueType,
    pub description: String,
}

/// Optimistic change to an existing issue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuePatch {
    pub status: Option<IssueStatus>,
    pub assigned_to: Option<User>,
}

impl IssuePatch {
    pub fn resolve() -> Self {
        Self {
            status: Some(IssueStatus::Resolved),
            assigned_to: None,
        }
    }

    pub fn assign(staff: User) -> Self {
        Self {
            status: None,
            assigned_to: Some(staff),
        }
    }
}

/// Body of `PATCH /issues/{id}/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateIssueRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IssueStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<i64>,
}

impl From<&IssuePatch> for UpdateIssueRequest {
    fn from(patch: &IssuePatch) -> Self {
        Self {
            status: patch.status.clone(),
            assigned_to: patch.assigned_to.as_ref().and_then(|u| u.id),
        }
    }
}

impl Reconcilable for Issue {
    type Id = i64;
    type Patch = IssuePatch;

    fn id(&self) -> i64 {
        self.issue_id
    }

    fn apply(&mut self, patch: &IssuePatch) {
        if let Some(status) = &patch.status {
            self.status = status.clone();
        }
        if let Some(staff) = &patch.assigned_to {
            self.assigned_to = Some(staff.clone());
        }
    }

    fn reflects(&self, patch: &IssuePatch) -> bool {
        let status_ok = patch.status.as_ref().is_none_or(|s| &self.status == s);
        let assignee_ok = patch.assigned_to.as_ref().is_none_or(|staff| {
            self.assigned_to.as_ref().map(|a| (a.id, &a.email)) == Some((staff.id, &staff.email))
        });
        status_ok && assignee_ok
    }
}
