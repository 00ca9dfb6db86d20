use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    Admin,
    Supervisor,
    Lawyer,
    Worker,
    Pyme,
}

impl UserRole {
    /// Operators bypass lead masking entirely.
    pub fn is_operator(&self) -> bool {
        matches!(self, UserRole::SuperAdmin | UserRole::Admin | UserRole::Supervisor)
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

pub fn first_name(full_name: &str) -> &str {
    full_name.split_whitespace().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_name_takes_leading_token() {
        assert_eq!(first_name("María Fernanda López"), "María");
        assert_eq!(first_name("  Juan  "), "Juan");
        assert_eq!(first_name(""), "");
    }

    #[test]
    fn only_back_office_roles_are_operators() {
        assert!(UserRole::Admin.is_operator());
        assert!(UserRole::SuperAdmin.is_operator());
        assert!(UserRole::Supervisor.is_operator());
        assert!(!UserRole::Lawyer.is_operator());
        assert!(!UserRole::Worker.is_operator());
    }
}
