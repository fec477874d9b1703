use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

/// The authenticated caller of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
}

impl Session {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), role: Role::User }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> CoreResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CoreError::Forbidden("Admin access required".to_string()))
        }
    }

    /// Owners see their own rows; admins see everything.
    pub fn require_access(&self, owner_id: &str) -> CoreResult<()> {
        if self.is_admin() || self.user_id == owner_id {
            Ok(())
        } else {
            Err(CoreError::Forbidden("Booking does not belong to you".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_rules() {
        let user = Session::user("u1");
        assert!(user.require_access("u1").is_ok());
        assert!(matches!(user.require_access("u2"), Err(CoreError::Forbidden(_))));
        assert!(user.require_admin().is_err());

        let admin = Session::admin("a1");
        assert!(admin.require_access("u2").is_ok());
        assert!(admin.require_admin().is_ok());
    }
}
