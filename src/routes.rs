use crate::models::{Role, Session};

/// Every screen the client can show. `Denied` is a real outcome, never an
/// empty screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    StudentView,
    LecturerView,
    HoDView,
    RegistrarView,
    LoginView,
    AuditLogView,
    SignupView,
    StartView,
    Denied,
}

impl ViewKind {
    pub fn is_dashboard(self) -> bool {
        matches!(
            self,
            ViewKind::StudentView
                | ViewKind::LecturerView
                | ViewKind::HoDView
                | ViewKind::RegistrarView
        )
    }
}

/// Places a user can try to navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Start,
    Login,
    Signup,
    Dashboard,
    AuditLogs,
}

pub struct RoleRouter;

impl RoleRouter {
    /// Dashboard for the session's role. Unknown roles are denied.
    pub fn resolve(session: Option<&Session>) -> ViewKind {
        match session {
            None => ViewKind::LoginView,
            Some(session) => Self::dashboard_for(&session.role),
        }
    }

    pub fn dashboard_for(role: &Role) -> ViewKind {
        match role {
            Role::Student => ViewKind::StudentView,
            Role::Lecturer => ViewKind::LecturerView,
            Role::HeadOfDepartment => ViewKind::HoDView,
            Role::AcademicRegistrar => ViewKind::RegistrarView,
            Role::Other(_) => ViewKind::Denied,
        }
    }

    /// View to show for a navigation attempt under the given session.
    pub fn navigate(session: Option<&Session>, destination: Destination) -> ViewKind {
        match destination {
            Destination::Start => ViewKind::StartView,
            Destination::Signup => ViewKind::SignupView,
            Destination::Login | Destination::Dashboard => Self::resolve(session),
            Destination::AuditLogs => match Self::resolve(session) {
                view if view.is_dashboard() => ViewKind::AuditLogView,
                other => other,
            },
        }
    }
}
