use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_USER: &str = "USER";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub login_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role_cd: String,
    pub depart_cd: Option<String>,
    pub position: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role_cd == ROLE_ADMIN
    }
}

/// Stored credentials, loaded only by the login path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub login_id: String,
    pub name: String,
    /// Plain-text password; required on create, optional on update.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role_cd: Option<String>,
    #[serde(default)]
    pub depart_cd: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl UserInput {
    pub fn validate(&self, require_password: bool) -> Result<(), DomainError> {
        if self.login_id.trim().is_empty() {
            return Err(DomainError::MissingField { field: "loginId" });
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::MissingField { field: "name" });
        }
        let has_password = self.password.as_deref().is_some_and(|pw| !pw.is_empty());
        if require_password && !has_password {
            return Err(DomainError::MissingField { field: "password" });
        }
        Ok(())
    }

    pub fn role_or_default(&self) -> &str {
        self.role_cd.as_deref().filter(|role| !role.trim().is_empty()).unwrap_or(ROLE_USER)
    }
}
