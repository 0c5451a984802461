pub mod audit_log;
pub mod auth;
pub mod course;
pub mod issue;
pub mod notification;
pub mod session;
pub mod stats;
pub mod user;

pub use audit_log::AuditLog;
pub use auth::{AuthResponse, COLLEGES, College, LoginRequest, RefreshRequest, RefreshResponse, SignupRequest};
pub use course::Course;
pub use issue::{Issue, IssuePatch, IssueStatus, IssueType, NewIssueRequest, UpdateIssueRequest};
pub use notification::{DeliveryMethod, Notification, NotificationPatch};
pub use session::Session;
pub use stats::Stats;
pub use user::{Role, User};
