//! Failed compensating actions, recorded for offline retry.

use std::time::Duration;

use chrono::Utc;
use common::storage::ObjectKey;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::gateway::DocumentStoreGateway;
use crate::config::ReconcileConfig;
use crate::entity::compensation_log;

/// Remove an object that no document references.
pub const ACTION_REMOVE_OBJECT: &str = "remove_object";

pub struct CompensationLog<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> CompensationLog<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn record(
        &self,
        action: &str,
        object_key: &str,
        document_id: Option<Uuid>,
        error: &str,
    ) -> Result<compensation_log::Model, DbErr> {
        let now = Utc::now();
        compensation_log::ActiveModel {
            action: Set(action.to_string()),
            object_key: Set(object_key.to_string()),
            document_id: Set(document_id),
            error: Set(error.to_string()),
            attempts: Set(1),
            created_at: Set(now),
            last_attempt_at: Set(now),
            resolved: Set(false),
            resolved_at: Set(None),
            ..Default::default()
        }
        .insert(self.conn)
        .await
    }

    /// Oldest unresolved entries first.
    pub async fn pending(&self, limit: u64) -> Result<Vec<compensation_log::Model>, DbErr> {
        compensation_log::Entity::find()
            .filter(compensation_log::Column::Resolved.eq(false))
            .order_by_asc(compensation_log::Column::CreatedAt)
            .order_by_asc(compensation_log::Column::Id)
            .limit(limit)
            .all(self.conn)
            .await
    }

    /// Mark an entry resolved. Returns false if it was already resolved.
    pub async fn resolve(&self, id: i32) -> Result<bool, DbErr> {
        let now = Utc::now();
        let result = compensation_log::Entity::update_many()
            .col_expr(compensation_log::Column::Resolved, Expr::value(true))
            .col_expr(compensation_log::Column::ResolvedAt, Expr::value(Some(now)))
            .col_expr(compensation_log::Column::LastAttemptAt, Expr::value(now))
            .filter(compensation_log::Column::Id.eq(id))
            .filter(compensation_log::Column::Resolved.eq(false))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn record_attempt(&self, id: i32, error: &str) -> Result<(), DbErr> {
        compensation_log::Entity::update_many()
            .col_expr(
                compensation_log::Column::Attempts,
                Expr::col(compensation_log::Column::Attempts).add(1),
            )
            .col_expr(compensation_log::Column::Error, Expr::value(error))
            .col_expr(compensation_log::Column::LastAttemptAt, Expr::value(Utc::now()))
            .filter(compensation_log::Column::Id.eq(id))
            .exec(self.conn)
            .await?;
        Ok(())
    }
}

/// Queue a failed object removal. A failure to queue is only logged.
pub async fn record_failed_removal<C: ConnectionTrait>(
    db: &C,
    key: &ObjectKey,
    document_id: Option<Uuid>,
    cause: &str,
) {
    match CompensationLog::new(db)
        .record(ACTION_REMOVE_OBJECT, key.as_str(), document_id, cause)
        .await
    {
        Ok(entry) => warn!(
            entry_id = entry.id,
            key = %key,
            error = cause,
            "Object removal failed, queued for reconciliation"
        ),
        Err(e) => error!(
            key = %key,
            error = cause,
            log_error = %e,
            "Object removal failed and could not be queued"
        ),
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub resolved: u64,
    pub failed: u64,
}

/// Run the reconciler as a background task.
pub async fn run_reconciler(
    db: DatabaseConnection,
    gateway: DocumentStoreGateway,
    config: ReconcileConfig,
) {
    info!(
        interval_secs = config.interval_secs,
        batch_size = config.batch_size,
        "Starting compensation reconciler"
    );

    let mut interval = tokio::time::interval(pass_interval(&config));

    loop {
        interval.tick().await;

        match reconcile_once(&db, &gateway, config.batch_size).await {
            Ok(report) if report.resolved + report.failed > 0 => info!(
                resolved = report.resolved,
                failed = report.failed,
                "Reconciliation pass finished"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Reconciliation pass failed"),
        }
    }
}

/// Pause between passes; a zero interval is raised to one second.
fn pass_interval(config: &ReconcileConfig) -> Duration {
    if config.interval_secs == 0 {
        warn!("reconcile.interval_secs is 0, using 1s");
    }
    Duration::from_secs(std::cmp::Ord::max(config.interval_secs, 1))
}

/// Retry up to `batch_size` unresolved compensating actions.
pub async fn reconcile_once<C: ConnectionTrait>(
    db: &C,
    gateway: &DocumentStoreGateway,
    batch_size: u64,
) -> anyhow::Result<ReconcileReport> {
    let log = CompensationLog::new(db);
    let mut report = ReconcileReport::default();

    for entry in log.pending(batch_size).await? {
        let outcome = match entry.action.as_str() {
            ACTION_REMOVE_OBJECT => match ObjectKey::parse(&entry.object_key) {
                Ok(key) => gateway.remove(&key).await.map_err(|e| e.to_string()),
                // Nothing a retry could ever remove.
                Err(_) => Ok(()),
            },
            other => Err(format!("unknown compensating action '{other}'")),
        };

        match outcome {
            Ok(()) => {
                log.resolve(entry.id).await?;
                report.resolved += 1;
            }
            Err(cause) => {
                warn!(
                    entry_id = entry.id,
                    attempts = entry.attempts + 1,
                    error = %cause,
                    "Compensating action failed again"
                );
                log.record_attempt(entry.id, &cause).await?;
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
