use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::database;
use crate::error::AppError;
use crate::services::aggregation::Aggregator;
use crate::services::gateway::DocumentStoreGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub gateway: DocumentStoreGateway,
    pub aggregator: Arc<dyn Aggregator>,
}

impl AppState {
    /// Run relational work under the configured query deadline.
    pub async fn query<T, E>(
        &self,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, AppError>
    where
        AppError: From<E>,
    {
        let limit = Duration::from_secs(self.config.database.query_timeout_secs.max(1));
        database::bounded(limit, call).await
    }
}
