use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use common::storage::ObjectKey;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tokio_util::io::ReaderStream;
use tracing::{instrument, warn};

use crate::entity::document;
use crate::error::AppError;
use crate::models::document::FileSignatureParams;
use crate::state::AppState;
use crate::utils::filename::content_disposition_value;

/// Serve an object of the filesystem store.
///
/// Signed requests (`expires` + `signature`, as issued for downloads) are
/// served as attachments. Unsigned requests only reach files of approved
/// documents and are served inline.
#[instrument(skip(state, params), fields(key = %key))]
pub async fn serve_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<FileSignatureParams>,
) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound("File not found".into());
    let key = ObjectKey::parse(&key).map_err(|_| not_found())?;

    let doc = state
        .query(
            document::Entity::find()
                .filter(document::Column::StorageKey.eq(key.as_str()))
                .one(&state.db),
        )
        .await?;

    let disposition = match (params.expires, params.signature.as_deref()) {
        (Some(expires), Some(signature)) => {
            if !state.gateway.verify(&key, expires, signature) {
                warn!("Rejected invalid or expired file signature");
                return Err(AppError::NotAuthorized("Invalid or expired link".into()));
            }
            "attachment"
        }
        _ => match doc {
            Some(ref d) if d.approval_state.is_public() => "inline",
            _ => return Err(not_found()),
        },
    };

    let (filename, content_type) = match doc {
        Some(d) => (d.filename, d.content_type),
        None => (
            key.file_name().to_string(),
            mime_guess::from_path(key.file_name())
                .first_or_octet_stream()
                .to_string(),
        ),
    };

    let reader = state.gateway.open(&key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(disposition, &filename),
        )
        .header(header::CACHE_CONTROL, "private, max-age=60")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}
