// src/models/evaluation.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::user::Role;

/// Represents the 'evaluations' table: admin-defined custom quizzes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub name: String,
    pub duration_minutes: i32,
    pub question_count: i32,
    pub is_active: bool,

    /// Tenant owning the evaluation. `None` means visible to everyone.
    pub company_tag: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Evaluation {
    /// Global admins reach every evaluation. Everyone else reaches untagged
    /// ones and those carrying their own company tag.
    pub fn accessible_by(&self, role: Role) -> bool {
        if role == Role::Admin {
            return true;
        }
        match self.company_tag.as_deref() {
            None => true,
            Some(own) => role.company_tag() == Some(own),
        }
    }

    /// Tenant admins only manage evaluations of their own tenant.
    pub fn manageable_by(&self, role: Role) -> bool {
        match role {
            Role::Admin => true,
            Role::AdminSupertaxis => self.company_tag.as_deref() == role.company_tag(),
            Role::User | Role::Supertaxis => false,
        }
    }
}

/// DTO for creating an evaluation.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEvaluationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: i32,
    #[validate(range(min = 1, max = 500))]
    pub question_count: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[validate(length(min = 1, max = 50))]
    pub company_tag: Option<String>,
}

fn default_active() -> bool {
    true
}

/// DTO for updating an evaluation. Fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateEvaluationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 1, max = 500))]
    pub question_count: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateEvaluationRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.duration_minutes.is_none()
            && self.question_count.is_none()
            && self.is_active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(tag: Option<&str>) -> Evaluation {
        Evaluation {
            id: 1,
            name: "Fleet drivers".into(),
            duration_minutes: 20,
            question_count: 10,
            is_active: true,
            company_tag: tag.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn untagged_evaluations_are_public() {
        let e = evaluation(None);
        assert!(e.accessible_by(Role::User));
        assert!(e.accessible_by(Role::Supertaxis));
        assert!(e.manageable_by(Role::Admin));
        assert!(!e.manageable_by(Role::AdminSupertaxis));
    }

    #[test]
    fn tagged_evaluations_stay_in_their_tenant() {
        let e = evaluation(Some("supertaxis"));
        assert!(!e.accessible_by(Role::User));
        assert!(e.accessible_by(Role::Supertaxis));
        assert!(e.accessible_by(Role::AdminSupertaxis));
        assert!(e.accessible_by(Role::Admin));
        assert!(e.manageable_by(Role::AdminSupertaxis));

        let other = evaluation(Some("othercorp"));
        assert!(!other.accessible_by(Role::Supertaxis));
        assert!(!other.manageable_by(Role::AdminSupertaxis));
    }
}
