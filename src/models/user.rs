use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of an authenticated user. Unrecognised role strings are kept as
/// `Other` so they can be routed to a denial instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Student,
    Lecturer,
    HeadOfDepartment,
    AcademicRegistrar,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Student => "Student",
            Role::Lecturer => "Lecturer",
            Role::HeadOfDepartment => "HeadOfDepartment",
            Role::AcademicRegistrar => "AcademicRegistrar",
            Role::Other(raw) => raw,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(
            self,
            Role::Lecturer | Role::HeadOfDepartment | Role::AcademicRegistrar
        )
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Student" => Role::Student,
            "Lecturer" => Role::Lecturer,
            "HeadOfDepartment" => Role::HeadOfDepartment,
            "AcademicRegistrar" => Role::AcademicRegistrar,
            _ => Role::Other(raw),
        }
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        Role::from(raw.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub college: Option<i64>,
    #[serde(default)]
    pub department: Option<i64>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}
