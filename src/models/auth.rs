use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct College {
    pub id: i64,
    pub name: &'static str,
}

/// Colleges a student can register under.
pub const COLLEGES: [College; 10] = [
    College { id: 1, name: "COCIS" },
    College { id: 2, name: "CEDAT" },
    College { id: 3, name: "LAW" },
    College { id: 4, name: "CAES" },
    College { id: 5, name: "CHUSS" },
    College { id: 6, name: "CONAS" },
    College { id: 7, name: "EDUC" },
    College { id: 8, name: "CHS" },
    College { id: 9, name: "COVAB" },
    College { id: 10, name: "COBAMS" },
];

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub college: Option<i64>,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), ClientError> {
        let required = [
            ("email", &self.email),
            ("password", &self.password),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ClientError::Validation(format!("{} is required", field)));
            }
        }
        if !self.email.contains('@') {
            return Err(ClientError::Validation(format!("invalid email: {}", self.email)));
        }
        match self.college {
            Some(id) if COLLEGES.iter().any(|c| c.id == id) => Ok(()),
            Some(id) => Err(ClientError::Validation(format!("unknown college: {}", id))),
            None => Err(ClientError::Validation("college is required".to_string())),
        }
    }
}

/// Body returned by `/token/` and `/register/`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
