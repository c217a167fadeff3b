use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried by every access token the API issues or accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: u64,
    pub iat: Option<u64>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub aud: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "patient" => Some(Role::Patient),
            "doctor" => Some(Role::Doctor),
            "staff" => Some(Role::Staff),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(Role::parse)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Admins and clinic staff operate on behalf of other users.
    pub fn is_staff_or_admin(&self) -> bool {
        matches!(self.role(), Some(Role::Staff) | Some(Role::Admin))
    }

    pub fn is_self(&self, id: &impl ToString) -> bool {
        self.id == id.to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub phone: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> User {
        User {
            id: "u-1".to_string(),
            phone: None,
            email: None,
            role: Some(role.to_string()),
            created_at: None,
        }
    }

    #[test]
    fn role_helpers() {
        assert!(user("admin").is_admin());
        assert!(user("staff").is_staff_or_admin());
        assert!(!user("doctor").is_staff_or_admin());
        assert_eq!(user("nurse").role(), None);
        assert!(user("patient").is_self(&"u-1"));
    }
}
