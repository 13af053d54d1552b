use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, DbErr};
use tracing::info;

use crate::entity::{compensation_log, document};

/// Ensure required composite indexes exist.
///
/// Entity attributes only describe single-column indexes, so the ones the
/// scoped listing and reconciliation queries rely on are created here.
pub async fn ensure_indexes<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    // Director dashboards and moderation queues:
    // WHERE university_id = ? AND approval_state = ?
    let by_university = Index::create()
        .if_not_exists()
        .name("idx_document_university_state")
        .table(document::Entity)
        .col(document::Column::UniversityId)
        .col(document::Column::ApprovalState)
        .to_owned();
    ensure_index(db, "idx_document_university_state", &by_university).await;

    // Leaderboard per-author aggregates:
    // WHERE author_id = ? AND approval_state = 'approved'
    let by_author = Index::create()
        .if_not_exists()
        .name("idx_document_author_state")
        .table(document::Entity)
        .col(document::Column::AuthorId)
        .col(document::Column::ApprovalState)
        .to_owned();
    ensure_index(db, "idx_document_author_state", &by_author).await;

    // Reconciler scan: unresolved entries, oldest first.
    let pending = Index::create()
        .if_not_exists()
        .name("idx_compensation_resolved_created")
        .table(compensation_log::Entity)
        .col(compensation_log::Column::Resolved)
        .col(compensation_log::Column::CreatedAt)
        .to_owned();
    ensure_index(db, "idx_compensation_resolved_created", &pending).await;

    Ok(())
}

async fn ensure_index<C: ConnectionTrait>(db: &C, name: &str, stmt: &IndexCreateStatement) {
    let backend = db.get_database_backend();
    match db.execute_raw(backend.build(stmt)).await {
        Ok(_) => {
            info!("Ensured index {} exists", name);
        }
        Err(e) => {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }
}
