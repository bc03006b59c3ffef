// src/bin/api_server.rs

use sitelog::infra::{config::Config, telemetry};
use sitelog::storage::{BlobStore, FsBlobStore, InMemoryRecordStore, PgRecordStore, RecordStore};
use sitelog::{transport, StoreBackend};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init();

    // --- Store Initialization ---
    let store: Arc<dyn RecordStore> = match config.backend {
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().unwrap_or_default();
            let pg = PgRecordStore::connect(url, config.db_max_connections).await?;
            if config.bootstrap_schema {
                pg.bootstrap_schema().await?;
            }
            info!(max_connections = config.db_max_connections, "connected to Postgres");
            Arc::new(pg)
        }
        StoreBackend::Memory => {
            warn!("using the in-memory store; data is lost on restart");
            Arc::new(InMemoryRecordStore::baseline())
        }
    };
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.blob_dir));
    info!(blob_dir = %config.blob_dir.display(), "blob store ready");

    let app_state = transport::http::AppState::new(store, blobs, &config);

    // --- API Server Initialization ---
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(cors);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "API server listening (Swagger UI at /swagger-ui)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
        })
        .await?;
    info!("graceful shutdown complete");
    Ok(())
}
