//! Derived metrics computed at read time from ratings, documents and profiles.
//!
//! Callers only see the [`Aggregator`] trait, so a cached or periodically
//! recomputed implementation can replace [`LiveAggregator`] without touching
//! handlers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{ApprovalState, Role};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use super::documents::DocumentRepository;
use crate::entity::{course, document, profile, rating, university};
use crate::error::AppError;

/// Most ids bound into one rating lookup, well below every backend's
/// parameter limit.
const RATING_BATCH: usize = 1000;

/// Average and count of the ratings on one document.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingStats {
    /// 0 when there are no ratings.
    pub average: f64,
    pub count: u64,
}

impl RatingStats {
    fn from_totals(total_stars: i64, count: i64) -> Self {
        if count <= 0 {
            return Self::default();
        }
        Self {
            average: total_stars as f64 / count as f64,
            count: count as u64,
        }
    }
}

/// Rating stats plus how many ratings gave each star value.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSummary {
    pub document_id: Uuid,
    pub stats: RatingStats,
    /// `histogram[i]` counts ratings of `i + 1` stars.
    pub histogram: [u64; 5],
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStanding {
    /// 1-based position.
    pub rank: u32,
    pub principal_id: Uuid,
    pub full_name: String,
    pub role: Role,
    pub university: Option<String>,
    pub course: Option<String>,
    pub points: i32,
    pub level: i32,
    /// Approved documents authored.
    pub uploads: u64,
    /// Downloads summed over those documents.
    pub downloads: i64,
    /// Mean over ratings on those documents, one decimal.
    pub average_rating: f64,
}

/// Counts shown on a director's dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectorStats {
    pub total_students: u64,
    pub total_professors: u64,
    pub total_documents: u64,
    pub pending_documents: u64,
}

#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Mean stars of a document; 0 when it has no ratings.
    async fn average_rating(&self, document_id: Uuid) -> Result<f64, AppError>;

    async fn rating_summary(&self, document_id: Uuid) -> Result<RatingSummary, AppError>;

    /// Stats for several documents at once. Documents without ratings map to
    /// the zero value.
    async fn rating_stats(
        &self,
        document_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, RatingStats>, AppError>;

    async fn leaderboard(&self, limit: u64) -> Result<Vec<UserStanding>, AppError>;

    async fn director_stats(&self, university_id: i32) -> Result<DirectorStats, AppError>;

    /// Record `stars` from `rater_id`, replacing their earlier rating.
    async fn rate(
        &self,
        rater_id: Uuid,
        document_id: Uuid,
        stars: i64,
    ) -> Result<RatingSummary, AppError>;
}

/// Computes everything from the base tables on every call.
pub struct LiveAggregator {
    db: DatabaseConnection,
}

impl LiveAggregator {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// `(total stars, rating count)` per rated document, queried in batches
    /// of [`RATING_BATCH`] ids.
    async fn totals_by_document(
        &self,
        document_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, (i64, i64)>, AppError> {
        let mut totals = HashMap::with_capacity(document_ids.len());
        for batch in document_ids.chunks(RATING_BATCH) {
            let rows: Vec<(Uuid, i64, i64)> = rating::Entity::find()
                .select_only()
                .column(rating::Column::DocumentId)
                .column_as(rating::Column::Stars.sum(), "total")
                .column_as(rating::Column::Stars.count(), "count")
                .filter(rating::Column::DocumentId.is_in(batch.iter().copied()))
                .group_by(rating::Column::DocumentId)
                .into_tuple()
                .all(&self.db)
                .await?;
            totals.extend(
                rows.into_iter()
                    .map(|(id, total, count)| (id, (total, count))),
            );
        }
        Ok(totals)
    }
}

#[async_trait]
impl Aggregator for LiveAggregator {
    async fn average_rating(&self, document_id: Uuid) -> Result<f64, AppError> {
        let stats = self
            .rating_stats(&[document_id])
            .await?
            .remove(&document_id)
            .unwrap_or_default();
        Ok(stats.average)
    }

    async fn rating_summary(&self, document_id: Uuid) -> Result<RatingSummary, AppError> {
        let rows: Vec<(i32, i64)> = rating::Entity::find()
            .select_only()
            .column(rating::Column::Stars)
            .column_as(rating::Column::Stars.count(), "count")
            .filter(rating::Column::DocumentId.eq(document_id))
            .group_by(rating::Column::Stars)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut summary = summarize(document_id, &rows);
        summary.stats.average = self.average_rating(document_id).await?;
        Ok(summary)
    }

    async fn rating_stats(
        &self,
        document_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, RatingStats>, AppError> {
        let totals = self.totals_by_document(document_ids).await?;
        Ok(document_ids
            .iter()
            .map(|id| {
                let stats = totals
                    .get(id)
                    .map(|&(total, count)| RatingStats::from_totals(total, count))
                    .unwrap_or_default();
                (*id, stats)
            })
            .collect())
    }

    async fn leaderboard(&self, limit: u64) -> Result<Vec<UserStanding>, AppError> {
        let profiles = profile::Entity::find()
            .filter(profile::Column::Active.eq(true))
            .order_by_desc(profile::Column::Points)
            .order_by_asc(profile::Column::CreatedAt)
            .order_by_asc(profile::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;
        if profiles.is_empty() {
            return Ok(Vec::new());
        }

        let author_ids: Vec<Uuid> = profiles.iter().map(|p| p.id).collect();
        let university_ids: Vec<i32> = profiles.iter().filter_map(|p| p.university_id).collect();
        let course_ids: Vec<i32> = profiles.iter().filter_map(|p| p.course_id).collect();

        let repo = DocumentRepository::new(&self.db);
        let (documents, universities, courses) = futures::try_join!(
            repo.approved_by_authors(&author_ids),
            university::Entity::find()
                .filter(university::Column::Id.is_in(university_ids))
                .all(&self.db),
            course::Entity::find()
                .filter(course::Column::Id.is_in(course_ids))
                .all(&self.db),
        )?;

        let document_ids: Vec<Uuid> = documents.iter().map(|d| d.id).collect();
        let ratings = self.totals_by_document(&document_ids).await?;

        let university_names: HashMap<i32, String> =
            universities.into_iter().map(|u| (u.id, u.code)).collect();
        let course_names: HashMap<i32, String> =
            courses.into_iter().map(|c| (c.id, c.name)).collect();

        let mut per_author: HashMap<Uuid, AuthorTotals> = HashMap::new();
        for doc in &documents {
            let totals = per_author.entry(doc.author_id).or_default();
            totals.add(doc, ratings.get(&doc.id));
        }

        Ok(profiles
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let totals = per_author.remove(&p.id).unwrap_or_default();
                UserStanding {
                    rank: i as u32 + 1,
                    principal_id: p.id,
                    full_name: p.full_name,
                    role: p.role,
                    university: p
                        .university_id
                        .and_then(|id| university_names.get(&id).cloned()),
                    course: p.course_id.and_then(|id| course_names.get(&id).cloned()),
                    points: p.points,
                    level: p.level,
                    uploads: totals.uploads,
                    downloads: totals.downloads,
                    average_rating: round_one_decimal(totals.average()),
                }
            })
            .collect())
    }

    async fn director_stats(&self, university_id: i32) -> Result<DirectorStats, AppError> {
        let members = || {
            profile::Entity::find().filter(profile::Column::UniversityId.eq(university_id))
        };
        let documents = || {
            document::Entity::find().filter(document::Column::UniversityId.eq(university_id))
        };

        let (total_students, total_professors, total_documents, pending_documents) =
            futures::try_join!(
                members()
                    .filter(profile::Column::Role.eq(Role::Student))
                    .count(&self.db),
                members()
                    .filter(profile::Column::Role.eq(Role::Professor))
                    .count(&self.db),
                documents().count(&self.db),
                documents()
                    .filter(document::Column::ApprovalState.eq(ApprovalState::Pending))
                    .count(&self.db),
            )?;

        Ok(DirectorStats {
            total_students,
            total_professors,
            total_documents,
            pending_documents,
        })
    }

    async fn rate(
        &self,
        rater_id: Uuid,
        document_id: Uuid,
        stars: i64,
    ) -> Result<RatingSummary, AppError> {
        let stars = validate_stars(stars)?;

        if document::Entity::find_by_id(document_id)
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Document not found".into()));
        }

        let now = Utc::now();
        let model = rating::ActiveModel {
            document_id: Set(document_id),
            rater_id: Set(rater_id),
            stars: Set(stars),
            created_at: Set(now),
            updated_at: Set(now),
        };
        rating::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([rating::Column::DocumentId, rating::Column::RaterId])
                    .update_columns([rating::Column::Stars, rating::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        self.rating_summary(document_id).await
    }
}

#[derive(Default)]
struct AuthorTotals {
    uploads: u64,
    downloads: i64,
    total_stars: i64,
    rating_count: u64,
}

impl AuthorTotals {
    fn add(&mut self, doc: &document::Model, ratings: Option<&(i64, i64)>) {
        self.uploads += 1;
        self.downloads += doc.downloads;
        if let Some(&(total, count)) = ratings {
            self.total_stars += total;
            self.rating_count += count.max(0) as u64;
        }
    }

    fn average(&self) -> f64 {
        if self.rating_count == 0 {
            0.0
        } else {
            self.total_stars as f64 / self.rating_count as f64
        }
    }
}

fn validate_stars(stars: i64) -> Result<i32, AppError> {
    match i32::try_from(stars) {
        Ok(s @ 1..=5) => Ok(s),
        _ => Err(AppError::Validation(
            "Stars must be an integer between 1 and 5".into(),
        )),
    }
}

fn summarize(document_id: Uuid, rows: &[(i32, i64)]) -> RatingSummary {
    let mut histogram = [0u64; 5];
    let mut total = 0i64;
    let mut count = 0i64;
    for &(stars, n) in rows {
        if let Ok(idx @ 0..=4) = usize::try_from(stars - 1) {
            histogram[idx] += n as u64;
            total += i64::from(stars) * n;
            count += n;
        }
    }
    RatingSummary {
        document_id,
        stats: RatingStats::from_totals(total, count),
        histogram,
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
