use axum::Json;
use axum::extract::{Query, State};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::director::*;
use crate::models::document::{DocumentListResponse, UniversityDocumentsParams};
use crate::services::moderation::ModerationEngine;
use crate::services::orchestrator::DocumentService;
use crate::services::scope::resolve_scope;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Director",
    operation_id = "getDirectorStats",
    summary = "Counts for the director's university",
    responses(
        (status = 200, description = "University statistics", body = DirectorStatsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not a director (NOT_AUTHORIZED)", body = ErrorBody),
        (status = 422, description = "Director without university (PROFILE_INCOMPLETE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(principal_id = %auth_user.principal_id))]
pub async fn director_stats(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DirectorStatsResponse>, AppError> {
    let scope = state
        .query(resolve_scope(&state.db, auth_user.principal_id))
        .await?;
    let stats = state
        .query(state.aggregator.director_stats(scope.director_university()?))
        .await?;
    Ok(Json(stats.into()))
}

#[utoipa::path(
    get,
    path = "/documents",
    tag = "Director",
    operation_id = "listUniversityDocuments",
    summary = "Documents of the director's university",
    description = "Returns every document of the director's university in any state, newest \
        first. Use `state=pending` for the review queue.",
    params(UniversityDocumentsParams),
    responses(
        (status = 200, description = "University documents", body = DocumentListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not a director (NOT_AUTHORIZED)", body = ErrorBody),
        (status = 422, description = "Director without university (PROFILE_INCOMPLETE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, params), fields(principal_id = %auth_user.principal_id))]
pub async fn university_documents(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<UniversityDocumentsParams>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let docs = DocumentService::new(&state)
        .university_documents(&auth_user, params.state)
        .await?;
    Ok(Json(docs.into()))
}

#[utoipa::path(
    get,
    path = "/professors",
    tag = "Director",
    operation_id = "listUniversityProfessors",
    summary = "Professors of the director's university",
    responses(
        (status = 200, description = "Professors by name", body = ProfessorListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not a director (NOT_AUTHORIZED)", body = ErrorBody),
        (status = 422, description = "Director without university (PROFILE_INCOMPLETE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(principal_id = %auth_user.principal_id))]
pub async fn university_professors(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ProfessorListResponse>, AppError> {
    let professors = state
        .query(async {
            let scope = resolve_scope(&state.db, auth_user.principal_id).await?;
            ModerationEngine::new(&state.db)
                .university_professors(&scope)
                .await
        })
        .await?;
    Ok(Json(ProfessorListResponse {
        professors: professors.into_iter().map(Into::into).collect(),
    }))
}
