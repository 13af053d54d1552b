use axum::Json;
use axum::extract::{Query, State};
use tracing::instrument;

use crate::error::AppError;
use crate::models::leaderboard::*;
use crate::models::shared::LimitParams;
use crate::services::orchestrator::DocumentService;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Leaderboard",
    operation_id = "getLeaderboard",
    summary = "Rank active users by points",
    description = "Active users by points, highest first; ties keep registration order. Upload \
        and download totals only count approved documents. `limit` defaults to 50 (max 100).",
    params(LimitParams),
    responses(
        (status = 200, description = "Leaderboard", body = LeaderboardResponse),
    ),
)]
#[instrument(skip(state, params))]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let standings = DocumentService::new(&state)
        .leaderboard(params.limit)
        .await?;
    Ok(Json(LeaderboardResponse {
        entries: standings.into_iter().map(Into::into).collect(),
    }))
}
