use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::document::*;
use crate::models::shared::LimitParams;
use crate::services::documents::DocumentFilter;
use crate::services::orchestrator::{DocumentService, SubmitMetadata, UploadedFile};
use crate::state::AppState;
use crate::utils::filename::upload_filename;

/// Room for the text fields next to the file part.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

pub fn submit_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    DefaultBodyLimit::max(
        usize::try_from(max_upload_size.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX),
    )
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Documents",
    operation_id = "listDocuments",
    summary = "List approved documents",
    description = "Returns approved documents, newest first. `q` is a case-insensitive substring \
        match over title, description and category. `min_rating` filters on the average rating \
        and is applied before `limit`/`offset`.",
    params(ListDocumentsParams),
    responses(
        (status = 200, description = "Approved documents", body = DocumentListResponse),
    ),
)]
#[instrument(skip(state, params))]
pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<ListDocumentsParams>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let filter = DocumentFilter::from(params);
    let docs = DocumentService::new(&state).list_approved(&filter).await?;
    Ok(Json(docs.into()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Documents",
    operation_id = "submitDocument",
    summary = "Submit a document",
    description = "Uploads a file with its metadata. Multipart fields: `file` (required), `title` \
        (required), `university_id` (required), `category` or `subject_id` (one required), \
        `file_type` (required), `description`, `course_id`, `year` (`2023` or `2023/2024`), `tags` \
        (JSON array or comma-separated). Submissions by professors and directors are approved \
        immediately; all others wait for review.",
    request_body(content_type = "multipart/form-data", description = "File and metadata"),
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 400, description = "Missing or invalid fields (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 422, description = "Profile incomplete (PROFILE_INCOMPLETE)", body = ErrorBody),
        (status = 500, description = "Could not save the document (PERSISTENCE_ERROR)", body = ErrorBody),
        (status = 502, description = "File storage failed (STORAGE_ERROR)", body = ErrorBody),
        (status = 503, description = "Timed out (TIMEOUT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(principal_id = %auth_user.principal_id))]
pub async fn submit_document(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_size = state.config.storage.max_upload_size;
    let mut metadata = SubmitMetadata::default();
    let mut file: Option<UploadedFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            let filename = upload_filename(field.file_name().unwrap_or_default())
                .map_err(|e| AppError::Validation(e.message().into()))?;
            let content_type = field.content_type().map(str::to_string);

            let mut data = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
            {
                if (data.len() + chunk.len()) as u64 > max_size {
                    return Err(AppError::Validation(format!(
                        "File exceeds maximum size of {max_size} bytes"
                    )));
                }
                data.extend_from_slice(&chunk);
            }

            file = Some(UploadedFile {
                filename,
                content_type,
                data,
            });
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read field '{name}': {e}")))?;
        let value = Some(text.trim().to_string()).filter(|v| !v.is_empty());

        match name.as_str() {
            "title" => metadata.title = value,
            "description" => metadata.description = value,
            "category" => metadata.category = value,
            "file_type" => metadata.file_type = value,
            "year" => metadata.year = value,
            "university_id" => metadata.university_id = parse_id_field(&name, value)?,
            "course_id" => metadata.course_id = parse_id_field(&name, value)?,
            "subject_id" => metadata.subject_id = parse_id_field(&name, value)?,
            "tags" => metadata.tags = value.map(|v| parse_tags(&v)).unwrap_or_default(),
            _ => {} // Ignore unknown fields.
        }
    }

    let doc = DocumentService::new(&state)
        .submit(&auth_user, metadata, file)
        .await?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(doc))))
}

#[utoipa::path(
    get,
    path = "/popular",
    tag = "Documents",
    operation_id = "listPopularDocuments",
    summary = "Most downloaded approved documents",
    params(LimitParams),
    responses(
        (status = 200, description = "Approved documents by downloads", body = DocumentListResponse),
    ),
)]
#[instrument(skip(state, params))]
pub async fn popular_documents(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let docs = DocumentService::new(&state)
        .popular(params.resolve(10, 50))
        .await?;
    Ok(Json(docs.into()))
}

#[utoipa::path(
    get,
    path = "/recent",
    tag = "Documents",
    operation_id = "listRecentDocuments",
    summary = "Most recently submitted approved documents",
    params(LimitParams),
    responses(
        (status = 200, description = "Approved documents, newest first", body = DocumentListResponse),
    ),
)]
#[instrument(skip(state, params))]
pub async fn recent_documents(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let docs = DocumentService::new(&state)
        .recent(params.resolve(10, 50))
        .await?;
    Ok(Json(docs.into()))
}

#[utoipa::path(
    get,
    path = "/mine",
    tag = "Documents",
    operation_id = "listMyDocuments",
    summary = "The caller's own documents",
    description = "Returns the caller's documents in every approval state, newest first.",
    params(LimitParams),
    responses(
        (status = 200, description = "Own documents", body = DocumentListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, params), fields(principal_id = %auth_user.principal_id))]
pub async fn my_documents(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let docs = DocumentService::new(&state)
        .mine(&auth_user, params.resolve(5, 50))
        .await?;
    Ok(Json(docs.into()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Documents",
    operation_id = "getDocument",
    summary = "Get a document",
    description = "Returns a document and counts a view. Documents that are not approved are \
        only visible to their author and to directors of their university.",
    params(("id" = String, Path, description = "Document ID (UUID)")),
    responses(
        (status = 200, description = "Document", body = DocumentResponse),
        (status = 400, description = "Invalid ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user), fields(document_id = %id))]
pub async fn get_document(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    let id = parse_document_id(&id)?;
    let doc = DocumentService::new(&state)
        .get_by_id(auth_user.as_ref(), id)
        .await?;
    Ok(Json(doc.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Documents",
    operation_id = "deleteDocument",
    summary = "Delete a document",
    description = "Authors may delete their own documents. Directors may delete student \
        submissions of their own university. The file is removed after the record.",
    params(("id" = String, Path, description = "Document ID (UUID)")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (NOT_AUTHORIZED, SCOPE_MISMATCH)", body = ErrorBody),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(document_id = %id, principal_id = %auth_user.principal_id))]
pub async fn delete_document(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_document_id(&id)?;
    DocumentService::new(&state).delete(&auth_user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{id}/download",
    tag = "Documents",
    operation_id = "downloadDocument",
    summary = "Get a download URL",
    description = "Counts a download and returns a short-lived URL for the file. If a signed \
        URL cannot be issued the permanent URL is returned instead.",
    params(("id" = String, Path, description = "Document ID (UUID)")),
    responses(
        (status = 200, description = "Download URL", body = DownloadResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(document_id = %id, principal_id = %auth_user.principal_id))]
pub async fn download_document(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DownloadResponse>, AppError> {
    let id = parse_document_id(&id)?;
    let ticket = DocumentService::new(&state)
        .download(&auth_user, id)
        .await?;
    Ok(Json(ticket.into()))
}

#[utoipa::path(
    post,
    path = "/{id}/moderation",
    tag = "Moderation",
    operation_id = "moderateDocument",
    summary = "Approve or reject a document",
    description = "Only directors of the document's university may moderate. Re-applying the \
        current decision succeeds and refreshes the approval timestamp.",
    params(("id" = String, Path, description = "Document ID (UUID)")),
    request_body = ModerationRequest,
    responses(
        (status = 200, description = "Document after moderation", body = DocumentResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (NOT_AUTHORIZED, SCOPE_MISMATCH)", body = ErrorBody),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Director without university (PROFILE_INCOMPLETE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(document_id = %id, principal_id = %auth_user.principal_id))]
pub async fn moderate_document(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<ModerationRequest>,
) -> Result<Json<DocumentResponse>, AppError> {
    let id = parse_document_id(&id)?;
    let doc = DocumentService::new(&state)
        .moderate(&auth_user, id, payload.approve)
        .await?;
    Ok(Json(doc.into()))
}

#[utoipa::path(
    put,
    path = "/{id}/rating",
    tag = "Ratings",
    operation_id = "rateDocument",
    summary = "Rate a document",
    description = "Sets the caller's rating (1-5 stars). Rating again replaces the previous value.",
    params(("id" = String, Path, description = "Document ID (UUID)")),
    request_body = RatingRequest,
    responses(
        (status = 200, description = "Updated rating summary", body = RatingSummaryResponse),
        (status = 400, description = "Invalid stars (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(document_id = %id, principal_id = %auth_user.principal_id))]
pub async fn rate_document(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<RatingRequest>,
) -> Result<Json<RatingSummaryResponse>, AppError> {
    let id = parse_document_id(&id)?;
    let summary = DocumentService::new(&state)
        .rate(&auth_user, id, payload.stars)
        .await?;
    Ok(Json(summary.into()))
}

#[utoipa::path(
    get,
    path = "/{id}/rating",
    tag = "Ratings",
    operation_id = "getDocumentRating",
    summary = "Rating summary of a document",
    params(("id" = String, Path, description = "Document ID (UUID)")),
    responses(
        (status = 200, description = "Rating summary", body = RatingSummaryResponse),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user), fields(document_id = %id))]
pub async fn get_rating(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RatingSummaryResponse>, AppError> {
    let id = parse_document_id(&id)?;
    let summary = DocumentService::new(&state)
        .rating_summary(auth_user.as_ref(), id)
        .await?;
    Ok(Json(summary.into()))
}

fn parse_document_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid document ID".into()))
}

fn parse_id_field(name: &str, value: Option<String>) -> Result<Option<i32>, AppError> {
    value
        .map(|v| {
            v.parse::<i32>()
                .map_err(|_| AppError::Validation(format!("{name} must be an integer")))
        })
        .transpose()
}

/// Tags arrive as a JSON array or as a comma-separated list.
fn parse_tags(raw: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(raw)
        .unwrap_or_else(|_| raw.split(',').map(str::to_string).collect())
}
