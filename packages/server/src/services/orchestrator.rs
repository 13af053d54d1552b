//! The user-facing document transactions: submit, browse, view, download,
//! rate, moderate and delete.

use chrono::{Datelike, Utc};
use common::ApprovalState;
use common::storage::ObjectKey;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, TransactionTrait};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::aggregation::{RatingStats, RatingSummary, UserStanding};
use super::documents::{DocumentFilter, DocumentRepository, NewDocument};
use super::moderation::{ModerationEngine, authorize_delete, initial_state, may_access};
use super::reconcile::record_failed_removal;
use super::scope::{Scope, ensure_profile, resolve_scope};
use crate::entity::{course, document, profile, subject, university};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::state::AppState;

/// Longest accepted title, in characters.
const MAX_TITLE_LEN: usize = 256;
/// Most tags kept on a document.
const MAX_TAGS: usize = 20;

/// File part of a submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Metadata part of a submission, as sent by the client.
#[derive(Debug, Clone, Default)]
pub struct SubmitMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub university_id: Option<i32>,
    pub course_id: Option<i32>,
    pub subject_id: Option<i32>,
    /// Defaults to the subject's name.
    pub category: Option<String>,
    pub file_type: Option<String>,
    /// `"2023"` or `"2023/2024"`; the current year when absent.
    pub year: Option<String>,
    pub tags: Vec<String>,
}

/// A document with its rating stats attached.
#[derive(Debug, Clone)]
pub struct RatedDocument {
    pub document: document::Model,
    pub rating: RatingStats,
}

/// Where to fetch a document's file from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTicket {
    pub url: String,
    pub filename: String,
}

#[derive(Debug)]
struct ValidSubmission {
    title: String,
    description: String,
    university_id: i32,
    course_id: Option<i32>,
    subject_id: Option<i32>,
    category: Option<String>,
    file_type: String,
    publication_year: i32,
    tags: Vec<String>,
}

pub struct DocumentService<'a> {
    state: &'a AppState,
}

impl<'a> DocumentService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Store the file, then register it. The stored object is removed again
    /// when the record cannot be written.
    pub async fn submit(
        &self,
        principal: &AuthUser,
        metadata: SubmitMetadata,
        file: Option<UploadedFile>,
    ) -> Result<document::Model, AppError> {
        let db = &self.state.db;
        let profile = self
            .state
            .query(ensure_profile(db, principal, &self.state.config.profile))
            .await?;
        Scope::try_from(&profile)?;

        let (mut valid, file) = validate_submission(metadata, file, Utc::now().year())?;
        self.state.query(self.check_references(&mut valid)).await?;
        let category = valid
            .category
            .take()
            .ok_or_else(|| AppError::MissingFields(vec!["category".into()]))?;

        let content_type = content_type_of(&file);
        let size = i64::try_from(file.data.len()).unwrap_or(i64::MAX);
        let stored = self
            .state
            .gateway
            .put(
                &principal.principal_id.to_string(),
                &file.filename,
                file.data,
                &content_type,
            )
            .await?;

        let new = NewDocument {
            title: valid.title,
            description: valid.description,
            file_type: valid.file_type,
            category,
            tags: valid.tags,
            filename: file.filename,
            content_type,
            size,
            storage_key: stored.key.to_string(),
            public_url: stored.public_url,
            university_id: valid.university_id,
            course_id: valid.course_id,
            subject_id: valid.subject_id,
            author_id: principal.principal_id,
            approval_state: initial_state(profile.role),
            publication_year: valid.publication_year,
        };

        match self
            .state
            .query(DocumentRepository::new(db).insert(new))
            .await
        {
            Ok(doc) => {
                info!(
                    document_id = %doc.id,
                    author_id = %doc.author_id,
                    state = %doc.approval_state,
                    "Document submitted"
                );
                Ok(doc)
            }
            // The insert may still land, so the object stays.
            Err(e @ AppError::Timeout(_)) => {
                warn!(key = %stored.key, "Document insert timed out, keeping stored object");
                Err(e)
            }
            Err(e) => {
                error!(
                    key = %stored.key,
                    error = %e,
                    "Document insert failed, removing stored object"
                );
                self.remove_object(&stored.key, None).await;
                Err(e)
            }
        }
    }

    /// Approved documents matching `filter`, newest first.
    pub async fn list_approved(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<RatedDocument>, AppError> {
        let docs = self
            .state
            .query(DocumentRepository::new(&self.state.db).list_approved(filter))
            .await?;
        self.attach_ratings(docs).await
    }

    pub async fn popular(&self, limit: u64) -> Result<Vec<RatedDocument>, AppError> {
        let docs = self
            .state
            .query(DocumentRepository::new(&self.state.db).popular(limit))
            .await?;
        self.attach_ratings(docs).await
    }

    pub async fn recent(&self, limit: u64) -> Result<Vec<RatedDocument>, AppError> {
        let docs = self
            .state
            .query(DocumentRepository::new(&self.state.db).recent(limit))
            .await?;
        self.attach_ratings(docs).await
    }

    /// The caller's own documents in every state.
    pub async fn mine(
        &self,
        principal: &AuthUser,
        limit: u64,
    ) -> Result<Vec<RatedDocument>, AppError> {
        let repo = DocumentRepository::new(&self.state.db);
        let docs = self
            .state
            .query(repo.by_author(principal.principal_id, limit))
            .await?;
        self.attach_ratings(docs).await
    }

    /// Load a document and count the view.
    pub async fn get_by_id(
        &self,
        principal: Option<&AuthUser>,
        id: Uuid,
    ) -> Result<RatedDocument, AppError> {
        let mut doc = self.find_accessible(principal, id).await?;

        match self
            .state
            .query(DocumentRepository::new(&self.state.db).increment_views(id))
            .await
        {
            Ok(true) => doc.views += 1,
            Ok(false) => {}
            Err(e) => warn!(document_id = %id, error = %e, "View counter update failed"),
        }

        let rating = self
            .state
            .query(self.state.aggregator.rating_stats(&[id]))
            .await?
            .remove(&id)
            .unwrap_or_default();
        Ok(RatedDocument {
            document: doc,
            rating,
        })
    }

    /// Resolve a download URL and count the download.
    ///
    /// A failed counter update is logged and never fails the download.
    pub async fn download(
        &self,
        principal: &AuthUser,
        id: Uuid,
    ) -> Result<DownloadTicket, AppError> {
        let doc = self.find_accessible(Some(principal), id).await?;

        if let Err(e) = self
            .state
            .query(DocumentRepository::new(&self.state.db).increment_downloads(id))
            .await
        {
            warn!(document_id = %id, error = %e, "Download counter update failed");
        }

        let url = match ObjectKey::parse(&doc.storage_key) {
            Ok(key) => self.state.gateway.download_url(&key).await,
            Err(e) => {
                warn!(document_id = %id, error = %e, "Stored key is invalid, using public URL");
                doc.public_url.clone()
            }
        };

        Ok(DownloadTicket {
            url,
            filename: doc.filename,
        })
    }

    /// Delete a document, then its file. A file that cannot be removed is
    /// queued for reconciliation and does not fail the call.
    pub async fn delete(&self, principal: &AuthUser, id: Uuid) -> Result<(), AppError> {
        let db = &self.state.db;
        let scope = self.state.query(resolve_scope(db, principal.principal_id)).await?;

        let doc = self
            .state
            .query(DocumentRepository::new(db).find(id))
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".into()))?;
        let author_role = self
            .state
            .query(profile::Entity::find_by_id(doc.author_id).one(db))
            .await?
            .map(|p| p.role);
        authorize_delete(&scope, &doc, author_role)?;

        let existed = self
            .state
            .query(async {
                let txn = db.begin().await?;
                let existed = DocumentRepository::new(&txn).delete(id).await?;
                txn.commit().await?;
                Ok::<_, DbErr>(existed)
            })
            .await?;
        if !existed {
            return Err(AppError::NotFound("Document not found".into()));
        }

        match ObjectKey::parse(&doc.storage_key) {
            Ok(key) => self.remove_object(&key, Some(id)).await,
            Err(e) => warn!(
                document_id = %id,
                error = %e,
                "Stored key is invalid, skipping removal"
            ),
        }

        info!(document_id = %id, deleted_by = %principal.principal_id, "Document deleted");
        Ok(())
    }

    pub async fn moderate(
        &self,
        principal: &AuthUser,
        id: Uuid,
        approve: bool,
    ) -> Result<document::Model, AppError> {
        self.state
            .query(async {
                let scope = resolve_scope(&self.state.db, principal.principal_id).await?;
                ModerationEngine::new(&self.state.db)
                    .moderate(&scope, id, approve)
                    .await
            })
            .await
    }

    pub async fn rate(
        &self,
        principal: &AuthUser,
        id: Uuid,
        stars: i64,
    ) -> Result<RatingSummary, AppError> {
        self.state
            .query(ensure_profile(
                &self.state.db,
                principal,
                &self.state.config.profile,
            ))
            .await?;
        self.find_accessible(Some(principal), id).await?;
        self.state
            .query(self.state.aggregator.rate(principal.principal_id, id, stars))
            .await
    }

    pub async fn rating_summary(
        &self,
        principal: Option<&AuthUser>,
        id: Uuid,
    ) -> Result<RatingSummary, AppError> {
        self.find_accessible(principal, id).await?;
        self.state
            .query(self.state.aggregator.rating_summary(id))
            .await
    }

    /// Leaderboard clamped to the configured bounds.
    pub async fn leaderboard(&self, limit: Option<u64>) -> Result<Vec<UserStanding>, AppError> {
        let config = &self.state.config.leaderboard;
        let limit = limit
            .unwrap_or(config.default_limit)
            .clamp(1, config.max_limit.max(1));
        self.state
            .query(self.state.aggregator.leaderboard(limit))
            .await
    }

    /// Documents of the director's university, optionally in one state.
    pub async fn university_documents(
        &self,
        principal: &AuthUser,
        state: Option<ApprovalState>,
    ) -> Result<Vec<RatedDocument>, AppError> {
        let docs = self
            .state
            .query(async {
                let scope = resolve_scope(&self.state.db, principal.principal_id).await?;
                ModerationEngine::new(&self.state.db)
                    .university_documents(&scope, state)
                    .await
            })
            .await?;
        self.attach_ratings(docs).await
    }

    async fn find_accessible(
        &self,
        principal: Option<&AuthUser>,
        id: Uuid,
    ) -> Result<document::Model, AppError> {
        let doc = self
            .state
            .query(DocumentRepository::new(&self.state.db).find(id))
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".into()))?;
        if doc.approval_state.is_public() {
            return Ok(doc);
        }

        let scope = match principal {
            Some(p) => Some(
                self.state
                    .query(resolve_scope(&self.state.db, p.principal_id))
                    .await?,
            ),
            None => None,
        };
        if may_access(
            &doc,
            scope.as_ref(),
            self.state.config.documents.download_policy,
        ) {
            Ok(doc)
        } else {
            // Unpublished documents are indistinguishable from missing ones.
            Err(AppError::NotFound("Document not found".into()))
        }
    }

    async fn attach_ratings(
        &self,
        docs: Vec<document::Model>,
    ) -> Result<Vec<RatedDocument>, AppError> {
        let ids: Vec<Uuid> = docs.iter().map(|d| d.id).collect();
        let mut stats = self
            .state
            .query(self.state.aggregator.rating_stats(&ids))
            .await?;
        Ok(docs
            .into_iter()
            .map(|document| RatedDocument {
                rating: stats.remove(&document.id).unwrap_or_default(),
                document,
            })
            .collect())
    }

    /// Make sure `university`, `course` and `subject` exist and agree, and
    /// default the category to the subject name.
    async fn check_references(&self, valid: &mut ValidSubmission) -> Result<(), AppError> {
        let db = &self.state.db;

        if university::Entity::find_by_id(valid.university_id)
            .one(db)
            .await?
            .is_none()
        {
            return Err(AppError::Validation("Unknown university".into()));
        }

        if let Some(course_id) = valid.course_id {
            course::Entity::find_by_id(course_id)
                .filter(course::Column::UniversityId.eq(valid.university_id))
                .one(db)
                .await?
                .ok_or_else(|| {
                    AppError::Validation("Course does not belong to the university".into())
                })?;
        }

        if let Some(subject_id) = valid.subject_id {
            let subject = subject::Entity::find_by_id(subject_id)
                .one(db)
                .await?
                .ok_or_else(|| AppError::Validation("Unknown subject".into()))?;
            if valid.course_id.is_some_and(|c| c != subject.course_id) {
                return Err(AppError::Validation(
                    "Subject does not belong to the course".into(),
                ));
            }
            if valid.category.is_none() {
                valid.category = Some(subject.name);
            }
        }

        Ok(())
    }

    async fn remove_object(&self, key: &ObjectKey, document_id: Option<Uuid>) {
        if let Err(e) = self.state.gateway.remove(key).await {
            record_failed_removal(&self.state.db, key, document_id, &e.to_string()).await;
        }
    }
}

/// Check required fields, listing every missing one at once.
fn validate_submission(
    metadata: SubmitMetadata,
    file: Option<UploadedFile>,
    current_year: i32,
) -> Result<(ValidSubmission, UploadedFile), AppError> {
    let title = non_blank(metadata.title);
    let category = non_blank(metadata.category);
    let file_type = non_blank(metadata.file_type);
    let file = file.filter(|f| !f.data.is_empty());

    let mut missing = Vec::new();
    if title.is_none() {
        missing.push("title".to_string());
    }
    if metadata.university_id.is_none() {
        missing.push("university_id".to_string());
    }
    if category.is_none() && metadata.subject_id.is_none() {
        missing.push("category".to_string());
    }
    if file_type.is_none() {
        missing.push("file_type".to_string());
    }
    if file.is_none() {
        missing.push("file".to_string());
    }

    let (Some(title), Some(university_id), Some(file_type), Some(file)) =
        (title, metadata.university_id, file_type, file)
    else {
        return Err(AppError::MissingFields(missing));
    };
    if !missing.is_empty() {
        return Err(AppError::MissingFields(missing));
    }

    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }

    let publication_year = parse_publication_year(metadata.year.as_deref(), current_year)?;

    Ok((
        ValidSubmission {
            title,
            description: metadata.description.unwrap_or_default().trim().to_string(),
            university_id,
            course_id: metadata.course_id,
            subject_id: metadata.subject_id,
            category,
            file_type: file_type.to_lowercase(),
            publication_year,
            tags: normalize_tags(metadata.tags),
        },
        file,
    ))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `"2023"` and `"2023/2024"` both mean 2023.
fn parse_publication_year(raw: Option<&str>, current_year: i32) -> Result<i32, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(current_year);
    };
    let first = raw.split('/').next().unwrap_or(raw).trim();
    match first.parse::<i32>() {
        Ok(year) if (1900..=current_year + 1).contains(&year) => Ok(year),
        _ => Err(AppError::Validation(format!(
            "Invalid year '{raw}', expected e.g. 2023 or 2023/2024"
        ))),
    }
}

/// Trimmed, non-empty, distinct tags in first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            out.push(tag.to_string());
        }
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}

fn content_type_of(file: &UploadedFile) -> String {
    match file.content_type.as_deref() {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => mime_guess::from_path(&file.filename)
            .first_or_octet_stream()
            .to_string(),
    }
}
