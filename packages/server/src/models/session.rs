use chrono::{DateTime, Utc};
use common::Role;
use serde::Serialize;

use crate::entity::profile;
use crate::services::scope::Scope;

/// Platform profile of the caller.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileResponse {
    pub id: String,
    #[schema(example = "ana.silva@uni.test")]
    pub email: String,
    #[schema(example = "ana.silva")]
    pub full_name: String,
    pub role: Role,
    pub university_id: Option<i32>,
    pub course_id: Option<i32>,
    #[schema(example = 0)]
    pub points: i32,
    #[schema(example = 1)]
    pub level: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<profile::Model> for ProfileResponse {
    fn from(p: profile::Model) -> Self {
        Self {
            id: p.id.to_string(),
            email: p.email,
            full_name: p.full_name,
            role: p.role,
            university_id: p.university_id,
            course_id: p.course_id,
            points: p.points,
            level: p.level,
            active: p.active,
            created_at: p.created_at,
        }
    }
}

/// Role and scope the caller acts with.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ScopeResponse {
    pub principal_id: String,
    pub role: Role,
    /// University the caller is scoped to; null for generic accounts.
    pub university_id: Option<i32>,
    pub course_id: Option<i32>,
}

impl From<Scope> for ScopeResponse {
    fn from(s: Scope) -> Self {
        Self {
            principal_id: s.principal_id.to_string(),
            role: s.role,
            university_id: s.university_id,
            course_id: s.course_id,
        }
    }
}
