// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::billing::entitlement::effective_is_pro;

/// Company tag shared by the Supertaxis roles and their evaluations.
pub const SUPERTAXIS_TAG: &str = "supertaxis";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    AdminSupertaxis,
    Supertaxis,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::AdminSupertaxis => "admin_supertaxis",
            Role::Supertaxis => "supertaxis",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "admin_supertaxis" => Some(Role::AdminSupertaxis),
            "supertaxis" => Some(Role::Supertaxis),
            _ => None,
        }
    }

    /// Roles allowed through the admin dashboard gate.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::AdminSupertaxis)
    }

    /// Tenant the role is scoped to. `None` means unscoped.
    pub fn company_tag(self) -> Option<&'static str> {
        match self {
            Role::AdminSupertaxis | Role::Supertaxis => Some(SUPERTAXIS_TAG),
            Role::User | Role::Admin => None,
        }
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique, stored lowercase.
    pub email: String,

    pub name: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// One of 'user', 'admin', 'admin_supertaxis', 'supertaxis'.
    pub role: String,

    /// Raw entitlement flag. Read through `effective_is_pro` / `with_effective_pro`.
    pub is_pro: bool,

    /// `None` with `is_pro` set means a grant without expiry.
    pub pro_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Unknown role strings are treated as the least privileged role.
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::User)
    }

    pub fn has_active_pro(&self, now: DateTime<Utc>) -> bool {
        effective_is_pro(self.is_pro, self.pro_expires_at, now)
    }

    /// Copy with `is_pro` corrected for an expiry that already passed.
    /// Nothing is written back.
    pub fn with_effective_pro(mut self, now: DateTime<Utc>) -> Self {
        self.is_pro = self.has_active_pro(now);
        self
    }
}

/// Fields required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name length must be between 1 and 100 characters."
    ))]
    pub name: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for an admin editing a user. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub role: Option<String>,
}

/// DTO for a manual Pro grant.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct GrantProRequest {
    #[validate(range(min = 1, max = 3650))]
    pub days: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(role: &str, is_pro: bool, expires: Option<DateTime<Utc>>) -> User {
        User {
            id: 1,
            email: "a@b.co".into(),
            name: "A".into(),
            password: String::new(),
            role: role.into(),
            is_pro,
            pro_expires_at: expires,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn roles_round_trip_and_scope() {
        for role in [
            Role::User,
            Role::Admin,
            Role::AdminSupertaxis,
            Role::Supertaxis,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert!(Role::AdminSupertaxis.is_admin());
        assert!(!Role::Supertaxis.is_admin());
        assert_eq!(Role::Supertaxis.company_tag(), Some(SUPERTAXIS_TAG));
        assert_eq!(Role::Admin.company_tag(), None);
    }

    #[test]
    fn unknown_role_is_plain_user() {
        assert_eq!(user("root", false, None).role(), Role::User);
    }

    #[test]
    fn effective_pro_is_corrected_locally() {
        let now = Utc::now();
        let expired = user("user", true, Some(now - Duration::days(1)));
        assert!(!expired.clone().with_effective_pro(now).is_pro);
        assert!(expired.is_pro);

        let legacy = user("user", true, None);
        assert!(legacy.with_effective_pro(now).is_pro);
    }
}
