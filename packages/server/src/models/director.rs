use serde::Serialize;

use crate::entity::profile;
use crate::services::aggregation::DirectorStats;

/// Counts for the director's university.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DirectorStatsResponse {
    #[schema(example = 240)]
    pub total_students: u64,
    #[schema(example = 18)]
    pub total_professors: u64,
    #[schema(example = 512)]
    pub total_documents: u64,
    /// Documents waiting for review.
    #[schema(example = 9)]
    pub pending_documents: u64,
}

impl From<DirectorStats> for DirectorStatsResponse {
    fn from(s: DirectorStats) -> Self {
        Self {
            total_students: s.total_students,
            total_professors: s.total_professors,
            total_documents: s.total_documents,
            pending_documents: s.pending_documents,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfessorResponse {
    pub id: String,
    #[schema(example = "Rui Costa")]
    pub full_name: String,
    #[schema(example = "rui.costa@uni.test")]
    pub email: String,
    pub course_id: Option<i32>,
    pub active: bool,
}

impl From<profile::Model> for ProfessorResponse {
    fn from(p: profile::Model) -> Self {
        Self {
            id: p.id.to_string(),
            full_name: p.full_name,
            email: p.email,
            course_id: p.course_id,
            active: p.active,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfessorListResponse {
    pub professors: Vec<ProfessorResponse>,
}
