use chrono::{DateTime, Utc};
use common::ApprovalState;
use serde::{Deserialize, Serialize};

use crate::entity::document;
use crate::services::aggregation::{RatingStats, RatingSummary};
use crate::services::documents::DocumentFilter;
use crate::services::orchestrator::{DownloadTicket, RatedDocument};

/// Filters of the public document listing.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListDocumentsParams {
    /// Case-insensitive substring of title, description or category.
    #[param(example = "calculus")]
    pub q: Option<String>,
    #[param(example = 1)]
    pub university_id: Option<i32>,
    /// Exact category (subject name).
    #[param(example = "Calculus I")]
    pub category: Option<String>,
    #[param(example = "pdf")]
    pub file_type: Option<String>,
    /// Minimum average rating (values <= 0 are ignored).
    #[param(example = 4.0)]
    pub min_rating: Option<f64>,
    /// Page size. Defaults to 10 when only `offset` is given.
    #[param(example = 10)]
    pub limit: Option<u64>,
    #[param(example = 0)]
    pub offset: Option<u64>,
}

impl From<ListDocumentsParams> for DocumentFilter {
    fn from(p: ListDocumentsParams) -> Self {
        Self {
            query: p.q,
            university_id: p.university_id,
            category: p.category,
            file_type: p.file_type.map(|t| t.to_lowercase()),
            min_rating: p.min_rating,
            limit: p.limit,
            offset: p.offset,
        }
    }
}

/// Document metadata with its rating stats.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DocumentResponse {
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: String,
    #[schema(example = "Calculus Notes")]
    pub title: String,
    pub description: String,
    #[schema(example = "pdf")]
    pub file_type: String,
    #[schema(example = "Calculus I")]
    pub category: String,
    #[schema(example = json!(["limits", "exam"]))]
    pub tags: Vec<String>,
    /// Original upload filename.
    #[schema(example = "calculus-notes.pdf")]
    pub filename: String,
    #[schema(example = "application/pdf")]
    pub content_type: String,
    /// File size in bytes.
    #[schema(example = 524288)]
    pub size: i64,
    #[schema(example = 1)]
    pub university_id: i32,
    pub course_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub author_id: String,
    pub approval_state: ApprovalState,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(example = 42)]
    pub downloads: i64,
    #[schema(example = 310)]
    pub views: i64,
    #[schema(example = 2024)]
    pub publication_year: i32,
    /// Mean star rating, unrounded; 0 when unrated.
    #[schema(example = 4.5)]
    pub average_rating: f64,
    #[schema(example = 12)]
    pub rating_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentResponse {
    fn new(m: document::Model, rating: RatingStats) -> Self {
        Self {
            id: m.id.to_string(),
            title: m.title,
            description: m.description,
            file_type: m.file_type,
            category: m.category,
            tags: serde_json::from_value(m.tags).unwrap_or_default(),
            filename: m.filename,
            content_type: m.content_type,
            size: m.size,
            university_id: m.university_id,
            course_id: m.course_id,
            subject_id: m.subject_id,
            author_id: m.author_id.to_string(),
            approval_state: m.approval_state,
            approved_by: m.approved_by.map(|id| id.to_string()),
            approved_at: m.approved_at,
            downloads: m.downloads,
            views: m.views,
            publication_year: m.publication_year,
            average_rating: rating.average,
            rating_count: rating.count,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<RatedDocument> for DocumentResponse {
    fn from(d: RatedDocument) -> Self {
        Self::new(d.document, d.rating)
    }
}

impl From<document::Model> for DocumentResponse {
    fn from(m: document::Model) -> Self {
        Self::new(m, RatingStats::default())
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentResponse>,
    /// Number of documents in this response.
    #[schema(example = 10)]
    pub total: u64,
}

impl From<Vec<RatedDocument>> for DocumentListResponse {
    fn from(docs: Vec<RatedDocument>) -> Self {
        let documents: Vec<DocumentResponse> = docs.into_iter().map(Into::into).collect();
        Self {
            total: documents.len() as u64,
            documents,
        }
    }
}

/// Query parameters of the director's document list.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct UniversityDocumentsParams {
    /// Only documents in this state.
    #[param(inline)]
    pub state: Option<ApprovalState>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ModerationRequest {
    /// `true` approves, `false` rejects.
    #[schema(example = true)]
    pub approve: bool,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RatingRequest {
    /// Integer from 1 to 5.
    #[schema(example = 4, minimum = 1, maximum = 5)]
    pub stars: i64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct RatingSummaryResponse {
    pub document_id: String,
    /// Mean star rating, unrounded; 0 when unrated.
    #[schema(example = 4.2)]
    pub average_rating: f64,
    #[schema(example = 5)]
    pub rating_count: u64,
    /// Number of ratings per star value, from 1 to 5 stars.
    #[schema(example = json!([0, 0, 1, 2, 2]))]
    pub histogram: Vec<u64>,
}

impl From<RatingSummary> for RatingSummaryResponse {
    fn from(s: RatingSummary) -> Self {
        Self {
            document_id: s.document_id.to_string(),
            average_rating: s.stats.average,
            rating_count: s.stats.count,
            histogram: s.histogram.to_vec(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DownloadResponse {
    /// Time-limited download URL (or the permanent URL when signing failed).
    pub url: String,
    /// Name to save the file as.
    #[schema(example = "calculus-notes.pdf")]
    pub filename: String,
}

impl From<DownloadTicket> for DownloadResponse {
    fn from(t: DownloadTicket) -> Self {
        Self {
            url: t.url,
            filename: t.filename,
        }
    }
}

/// Signature of a time-limited file URL.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct FileSignatureParams {
    /// Unix timestamp after which the URL is invalid.
    pub expires: Option<i64>,
    /// Hex HMAC-SHA256 signature.
    pub signature: Option<String>,
}
