use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common::storage::filesystem::FilesystemObjectStore;
use common::storage::s3::S3ObjectStore;
use common::storage::{ObjectStore, UrlSigner};
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::{AppConfig, StorageBackend, StorageConfig};
use server::services::aggregation::LiveAggregator;
use server::services::gateway::DocumentStoreGateway;
use server::services::reconcile::run_reconciler;
use server::state::AppState;
use server::{database, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = database::init_db(&config.database)
        .await
        .context("Failed to connect to database")?;
    seed::ensure_indexes(&db).await?;

    let store = build_store(&config.storage).await?;
    let gateway = DocumentStoreGateway::new(
        store,
        Duration::from_secs(config.storage.timeout_secs),
        config.storage.signed_url_ttl_secs,
    );

    if config.reconcile.enabled {
        tokio::spawn(run_reconciler(
            db.clone(),
            gateway.clone(),
            config.reconcile.clone(),
        ));
    } else {
        info!("Compensation reconciler disabled");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        aggregator: Arc::new(LiveAggregator::new(db.clone())),
        db,
        config,
        gateway,
    };

    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::Filesystem => {
            let signer = UrlSigner::new(&config.signing_secret, config.public_base_url.clone());
            let store =
                FilesystemObjectStore::new(config.base_path.clone(), config.max_upload_size, signer)
                    .await
                    .context("Failed to prepare object directory")?;
            info!(path = %config.base_path.display(), "Using filesystem object store");
            Arc::new(store)
        }
        StorageBackend::S3 => {
            let store = S3ObjectStore::new(&config.s3, config.max_upload_size)
                .context("Failed to configure S3 object store")?;
            info!(bucket = %config.s3.bucket, "Using S3 object store");
            Arc::new(store)
        }
    };
    Ok(store)
}
