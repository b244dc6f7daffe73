use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{extract::FromRef, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{
    analytics::{domain::filters::MonthPolicy, services::AnalyticsService},
    cors::cors_layer,
    database::PostgresConnection,
    repos::{DynTransactionStore, InMemoryTransactionStore},
};

/// Where the transaction catalog is read from.
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogSource {
    Postgres {
        database_url: String,
        pool_size: u32,
        timeout_seconds: u8,
    },
    /// A JSON export of the catalog, loaded into memory at startup.
    JsonFile(PathBuf),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Options {
    pub catalog: CatalogSource,
    pub month_policy: MonthPolicy,
    pub port: u16,
    pub query_timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct AppState {
    analytics_service: AnalyticsService,
}

impl AppState {
    pub fn new(analytics_service: AnalyticsService) -> Self {
        Self { analytics_service }
    }
}

impl FromRef<AppState> for AnalyticsService {
    fn from_ref(state: &AppState) -> Self {
        state.analytics_service.clone()
    }
}

pub async fn serve(opts: Options) -> anyhow::Result<()> {
    let store = open_store(&opts.catalog).await?;

    let mut analytics_service = AnalyticsService::new(store, opts.month_policy);
    if let Some(timeout) = opts.query_timeout {
        analytics_service = analytics_service.with_query_timeout(timeout);
    }

    let app = build_router(AppState::new(analytics_service));

    let address = SocketAddr::from(([0, 0, 0, 0], opts.port));
    info!(%address, month_policy = ?opts.month_policy, "Serving analytics API.");

    axum::Server::bind(&address)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");

    Ok(())
}

/// Build the application's routes around the provided state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(crate::analytics::http::routes())
        .route("/health", get(health))
        .layer(cors_layer())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn open_store(catalog: &CatalogSource) -> anyhow::Result<DynTransactionStore> {
    match catalog {
        CatalogSource::Postgres {
            database_url,
            pool_size,
            timeout_seconds,
        } => {
            let connection =
                PostgresConnection::connect(database_url, *pool_size, *timeout_seconds).await?;

            Ok(Arc::new(connection))
        }
        CatalogSource::JsonFile(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
            let store = InMemoryTransactionStore::from_json(&json)
                .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;

            info!(path = %path.display(), "Loaded catalog into memory.");

            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(?error, "Failed to listen for Ctrl-C.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(?error, "Failed to listen for SIGTERM.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down."),
        () = terminate => info!("Received SIGTERM, shutting down."),
    }
}
