//! Document records: inserts, filtered reads, counters and state writes.

use chrono::{DateTime, Utc};
use common::ApprovalState;
use sea_orm::sea_query::{Expr, ExprTrait, Func, LikeExpr, Query, SelectStatement};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use uuid::Uuid;

use crate::entity::{document, rating};
use crate::models::shared::escape_like;

/// Page size used when an offset is given without a limit.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Everything needed to register a stored upload.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub description: String,
    pub file_type: String,
    pub category: String,
    pub tags: Vec<String>,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub storage_key: String,
    pub public_url: String,
    pub university_id: i32,
    pub course_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub author_id: Uuid,
    pub approval_state: ApprovalState,
    pub publication_year: i32,
}

/// Named optional filters of the public listing. Every `None` field leaves
/// the listing unrestricted on that axis.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Case-insensitive substring of title, description or category.
    pub query: Option<String>,
    pub university_id: Option<i32>,
    /// Exact category (subject name).
    pub category: Option<String>,
    /// Exact file type, e.g. `pdf`.
    pub file_type: Option<String>,
    /// Minimum average rating; applied after aggregation, values <= 0 ignored.
    pub min_rating: Option<f64>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl DocumentFilter {
    pub fn min_rating(&self) -> Option<f64> {
        self.min_rating.filter(|r| *r > 0.0)
    }

    /// Effective `(limit, offset)`; `offset` alone implies a default page.
    pub fn window(&self) -> (Option<u64>, u64) {
        let offset = self.offset.unwrap_or(0);
        let limit = match (self.limit, self.offset) {
            (Some(limit), _) => Some(limit),
            (None, Some(_)) => Some(DEFAULT_PAGE_SIZE),
            (None, None) => None,
        };
        (limit, offset)
    }
}

pub struct DocumentRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> DocumentRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, new: NewDocument) -> Result<document::Model, DbErr> {
        let now = Utc::now();
        let (approved_by, approved_at) = if new.approval_state.is_public() {
            (Some(new.author_id), Some(now))
        } else {
            (None, None)
        };

        let model = document::ActiveModel {
            id: Set(Uuid::now_v7()),
            title: Set(new.title),
            description: Set(new.description),
            file_type: Set(new.file_type),
            category: Set(new.category),
            tags: Set(serde_json::Value::from(new.tags)),
            filename: Set(new.filename),
            content_type: Set(new.content_type),
            size: Set(new.size),
            storage_key: Set(new.storage_key),
            public_url: Set(new.public_url),
            university_id: Set(new.university_id),
            course_id: Set(new.course_id),
            subject_id: Set(new.subject_id),
            author_id: Set(new.author_id),
            approval_state: Set(new.approval_state),
            approved_by: Set(approved_by),
            approved_at: Set(approved_at),
            downloads: Set(0),
            views: Set(0),
            publication_year: Set(new.publication_year),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(self.conn).await
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<document::Model>, DbErr> {
        document::Entity::find_by_id(id).one(self.conn).await
    }

    /// Approved documents matching `filter`, newest first, windowed by
    /// `limit`/`offset` after every filter (`min_rating` included) applies.
    pub async fn list_approved(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<document::Model>, DbErr> {
        let mut select = approved().order_by_desc(document::Column::CreatedAt);

        if let Some(ref query) = filter.query {
            let term = escape_like(query.trim());
            if !term.is_empty() {
                let pattern = format!("%{}%", term.to_lowercase());
                select = select.filter(
                    Condition::any()
                        .add(lower_like(document::Column::Title, &pattern))
                        .add(lower_like(document::Column::Description, &pattern))
                        .add(lower_like(document::Column::Category, &pattern)),
                );
            }
        }
        if let Some(university_id) = filter.university_id {
            select = select.filter(document::Column::UniversityId.eq(university_id));
        }
        if let Some(ref category) = filter.category {
            select = select.filter(document::Column::Category.eq(category.as_str()));
        }
        if let Some(ref file_type) = filter.file_type {
            select = select.filter(document::Column::FileType.eq(file_type.as_str()));
        }
        if let Some(min_rating) = filter.min_rating() {
            select = select.filter(document::Column::Id.in_subquery(rated_at_least(min_rating)));
        }

        select = select.order_by_desc(document::Column::Id);

        let (limit, offset) = filter.window();
        if offset > 0 {
            select = select.offset(offset);
        }
        if let Some(limit) = limit {
            select = select.limit(limit);
        }

        select.all(self.conn).await
    }

    /// Approved documents with the most downloads.
    pub async fn popular(&self, limit: u64) -> Result<Vec<document::Model>, DbErr> {
        approved()
            .order_by_desc(document::Column::Downloads)
            .order_by_desc(document::Column::CreatedAt)
            .limit(limit)
            .all(self.conn)
            .await
    }

    /// Most recently submitted approved documents.
    pub async fn recent(&self, limit: u64) -> Result<Vec<document::Model>, DbErr> {
        approved()
            .order_by_desc(document::Column::CreatedAt)
            .order_by_desc(document::Column::Id)
            .limit(limit)
            .all(self.conn)
            .await
    }

    /// An author's documents in every state, newest first.
    pub async fn by_author(
        &self,
        author_id: Uuid,
        limit: u64,
    ) -> Result<Vec<document::Model>, DbErr> {
        document::Entity::find()
            .filter(document::Column::AuthorId.eq(author_id))
            .order_by_desc(document::Column::CreatedAt)
            .order_by_desc(document::Column::Id)
            .limit(limit)
            .all(self.conn)
            .await
    }

    /// Approved documents of several authors, for per-user aggregates.
    pub async fn approved_by_authors(
        &self,
        author_ids: &[Uuid],
    ) -> Result<Vec<document::Model>, DbErr> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }
        approved()
            .filter(document::Column::AuthorId.is_in(author_ids.iter().copied()))
            .all(self.conn)
            .await
    }

    /// Every document of a university, optionally in one state, newest first.
    pub async fn by_university(
        &self,
        university_id: i32,
        state: Option<ApprovalState>,
    ) -> Result<Vec<document::Model>, DbErr> {
        let mut select =
            document::Entity::find().filter(document::Column::UniversityId.eq(university_id));
        if let Some(state) = state {
            select = select.filter(document::Column::ApprovalState.eq(state));
        }
        select
            .order_by_desc(document::Column::CreatedAt)
            .order_by_desc(document::Column::Id)
            .all(self.conn)
            .await
    }

    pub async fn count_by_university(
        &self,
        university_id: i32,
        state: Option<ApprovalState>,
    ) -> Result<u64, DbErr> {
        let mut select =
            document::Entity::find().filter(document::Column::UniversityId.eq(university_id));
        if let Some(state) = state {
            select = select.filter(document::Column::ApprovalState.eq(state));
        }
        select.count(self.conn).await
    }

    /// `downloads = downloads + 1`. Returns whether a row was updated.
    pub async fn increment_downloads(&self, id: Uuid) -> Result<bool, DbErr> {
        self.increment(id, document::Column::Downloads).await
    }

    /// `views = views + 1`. Returns whether a row was updated.
    pub async fn increment_views(&self, id: Uuid) -> Result<bool, DbErr> {
        self.increment(id, document::Column::Views).await
    }

    async fn increment(&self, id: Uuid, column: document::Column) -> Result<bool, DbErr> {
        let result = document::Entity::update_many()
            .col_expr(column, Expr::col(column).add(1))
            .filter(document::Column::Id.eq(id))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Single conditional write of a moderation decision.
    ///
    /// Only matches when the document still belongs to `university_id`.
    /// Returns whether a row was updated.
    pub async fn set_state(
        &self,
        id: Uuid,
        university_id: i32,
        state: ApprovalState,
        approver_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let result = document::Entity::update_many()
            .col_expr(document::Column::ApprovalState, Expr::value(state))
            .col_expr(document::Column::ApprovedBy, Expr::value(Some(approver_id)))
            .col_expr(document::Column::ApprovedAt, Expr::value(Some(at)))
            .col_expr(document::Column::UpdatedAt, Expr::value(at))
            .filter(document::Column::Id.eq(id))
            .filter(document::Column::UniversityId.eq(university_id))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Delete a document and its ratings. Returns whether the document existed.
    ///
    /// Run inside a transaction so ratings are not lost when the document
    /// delete fails.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DbErr> {
        rating::Entity::delete_many()
            .filter(rating::Column::DocumentId.eq(id))
            .exec(self.conn)
            .await?;
        let result = document::Entity::delete_by_id(id).exec(self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}

fn approved() -> Select<document::Entity> {
    document::Entity::find().filter(document::Column::ApprovalState.eq(ApprovalState::Approved))
}

/// Ids of documents whose mean rating is at least `min`. Unrated documents
/// average 0 and never match a positive minimum.
fn rated_at_least(min: f64) -> SelectStatement {
    Query::select()
        .column(rating::Column::DocumentId)
        .from(rating::Entity)
        .group_by_col(rating::Column::DocumentId)
        .and_having(Expr::expr(Func::avg(Expr::col(rating::Column::Stars))).gte(min))
        .to_owned()
}

fn lower_like(column: document::Column, pattern: &str) -> Expr {
    Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(pattern).escape('\\'))
}
