use common::Role;
use serde::Serialize;

use crate::services::aggregation::UserStanding;

#[derive(Serialize, utoipa::ToSchema)]
pub struct LeaderboardEntry {
    #[schema(example = 1)]
    pub rank: u32,
    pub principal_id: String,
    #[schema(example = "Ana Silva")]
    pub full_name: String,
    pub role: Role,
    /// University code.
    #[schema(example = "UL")]
    pub university: Option<String>,
    #[schema(example = "Computer Science")]
    pub course: Option<String>,
    #[schema(example = 120)]
    pub points: i32,
    #[schema(example = 3)]
    pub level: i32,
    /// Approved documents authored.
    #[schema(example = 7)]
    pub uploads: u64,
    /// Downloads across those documents.
    #[schema(example = 431)]
    pub downloads: i64,
    /// Mean rating across those documents, one decimal.
    #[schema(example = 4.6)]
    pub average_rating: f64,
}

impl From<UserStanding> for LeaderboardEntry {
    fn from(s: UserStanding) -> Self {
        Self {
            rank: s.rank,
            principal_id: s.principal_id.to_string(),
            full_name: s.full_name,
            role: s.role,
            university: s.university,
            course: s.course,
            points: s.points,
            level: s.level,
            uploads: s.uploads,
            downloads: s.downloads,
            average_rating: s.average_rating,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
}
