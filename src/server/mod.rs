//! HTTP surface of the relay.
//!
//! Every route forwards to one [`FileStore`] call with the caller's token,
//! except `/upload-image`, which goes through [`AssetUploader`].

mod error;
pub mod routes;

use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{Backend, Config};
use crate::storage::{FileStore, GitLabStorage, MemoryStore};
use crate::upload::AssetUploader;

pub use error::ApiError;

/// Shared state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FileStore>,
    pub uploader: AssetUploader,
}

impl AppState {
    pub fn new(store: Arc<dyn FileStore>, asset_dir: &str) -> Self {
        AppState {
            uploader: AssetUploader::new(store.clone(), Some(asset_dir)),
            store,
        }
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/repos", get(routes::list_repos))
        .route("/docs", get(routes::list_docs))
        .route("/file", get(routes::read_file).post(routes::update_file))
        .route("/new-file", post(routes::create_file))
        .route("/upload-image", post(routes::upload_image))
        .route("/delete-file", delete(routes::delete_file))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_store(config: &Config) -> anyhow::Result<Arc<dyn FileStore>> {
    match config.backend {
        Backend::Gitlab => {
            let storage = GitLabStorage::new(&config.gitlab_api, Some(&config.branch))
                .map_err(|report| anyhow::anyhow!("{:?}", report))
                .context("Failed to build GitLab client")?;
            info!("Using {}", storage);
            Ok(Arc::new(storage))
        }
        Backend::Memory => {
            info!(branch = %config.branch, "Using in-memory store");
            Ok(Arc::new(MemoryStore::new(Some(&config.branch))))
        }
    }
}

/// Bind and serve until the process is stopped.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = build_store(&config)?;
    let app = router(AppState::new(store, &config.asset_dir), config.max_upload_bytes);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("GitLab CMS relay listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
