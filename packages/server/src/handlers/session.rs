use axum::Json;
use axum::extract::State;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::session::{ProfileResponse, ScopeResponse};
use crate::services::scope::{ensure_profile, resolve_scope};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/",
    tag = "Session",
    operation_id = "startSession",
    summary = "Ensure the caller has a profile",
    description = "Creates the caller's profile with the configured defaults on first call and \
        returns it. Safe to call on every sign-in.",
    responses(
        (status = 200, description = "Caller's profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(principal_id = %auth_user.principal_id))]
pub async fn start_session(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state
        .query(ensure_profile(&state.db, &auth_user, &state.config.profile))
        .await?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Session",
    operation_id = "getScope",
    summary = "Resolve the caller's role and scope",
    responses(
        (status = 200, description = "Caller's scope", body = ScopeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Account deactivated (NOT_AUTHORIZED)", body = ErrorBody),
        (status = 422, description = "Director without university (PROFILE_INCOMPLETE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(principal_id = %auth_user.principal_id))]
pub async fn get_scope(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ScopeResponse>, AppError> {
    let scope = state
        .query(resolve_scope(&state.db, auth_user.principal_id))
        .await?;
    Ok(Json(scope.into()))
}
