use std::time::Duration;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};

use crate::config::DatabaseConfig;
use crate::entity::{compensation_log, course, document, profile, rating, subject, university};
use crate::error::AppError;

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.to_owned());

    opt.max_connections(config.max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    create_schema(&db).await?;

    Ok(db)
}

/// Create every table (parents first) and its entity-declared indexes.
pub async fn create_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    create_entity(db, university::Entity).await?;
    create_entity(db, course::Entity).await?;
    create_entity(db, subject::Entity).await?;
    create_entity(db, profile::Entity).await?;
    create_entity(db, document::Entity).await?;
    create_entity(db, rating::Entity).await?;
    create_entity(db, compensation_log::Entity).await?;
    Ok(())
}

async fn create_entity<C, E>(db: &C, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute_raw(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute_raw(backend.build(&index)).await?;
    }

    Ok(())
}

/// Run a database call, failing with a retryable `Timeout` once `limit`
/// elapses. Dropping the call rolls back any transaction it holds.
pub async fn bounded<T, E>(
    limit: Duration,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, AppError>
where
    AppError: From<E>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::Timeout(format!(
            "database call exceeded {}s",
            limit.as_secs()
        ))),
    }
}
