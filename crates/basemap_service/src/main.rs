mod metrics;

use crate::metrics::Metrics;
use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use basemap::reload::{reload_construction_3d, reload_parcel_and_building, ReloadReport};
use basemap::store::Store;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

/// Holds all configuration for the basemap_service application.
#[derive(Debug, Clone)]
struct Config {
    listen_addr: SocketAddr,
    db_path: PathBuf,
    parcel_package_dir: PathBuf,
    construction_package_dir: PathBuf,
    forbidden_areas_dir: PathBuf,
}

impl Config {
    /// Parses configuration from environment variables.
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            listen_addr: std::env::var("BASEMAP_LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".into())
                .parse()
                .context("Failed to parse BASEMAP_LISTEN_ADDR")?,
            db_path: std::env::var("BASEMAP_DB_PATH")
                .context("BASEMAP_DB_PATH must be set")?
                .into(),
            parcel_package_dir: std::env::var("BASEMAP_PARCEL_PACKAGE_DIR")
                .context("BASEMAP_PARCEL_PACKAGE_DIR must be set")?
                .into(),
            construction_package_dir: std::env::var("BASEMAP_CONSTRUCTION_PACKAGE_DIR")
                .context("BASEMAP_CONSTRUCTION_PACKAGE_DIR must be set")?
                .into(),
            forbidden_areas_dir: std::env::var("BASEMAP_FORBIDDEN_AREAS_DIR")
                .context("BASEMAP_FORBIDDEN_AREAS_DIR must be set")?
                .into(),
        })
    }
}

struct AppState {
    config: Config,
    metrics: Arc<Metrics>,
    /// One writer per process. Cross-process exclusion (a second service
    /// instance on the same store) must be guaranteed by the operator.
    store: Mutex<Store>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env()?;
    tracing::info!(config = ?config, "Loaded configuration");

    let store = Store::open(&config.db_path)
        .with_context(|| format!("Failed to open store at {}", config.db_path.display()))?;
    let metrics = Arc::new(Metrics::new());

    let state = Arc::new(AppState {
        config: config.clone(),
        metrics: metrics.clone(),
        store: Mutex::new(store),
    });

    let router = Router::new()
        .route("/load/parcel_and_building", post(load_parcel_and_building))
        .route("/load/3d_construction", post(load_3d_construction))
        .route("/metrics", get(serve_metrics))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "Reload service listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Reload service shut down gracefully.");
    Ok(())
}

async fn serve_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics.render()
}

async fn load_parcel_and_building(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    run_reload(state, "parcel_and_building", |state: &AppState, store: &mut Store| {
        let package = basemap::source::PackageDir::open(&state.config.parcel_package_dir);
        reload_parcel_and_building(store, &package)
    })
    .await
}

async fn load_3d_construction(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    run_reload(state, "3d_construction", |state: &AppState, store: &mut Store| {
        let package = basemap::source::PackageDir::open(&state.config.construction_package_dir);
        reload_construction_3d(store, &package, &state.config.forbidden_areas_dir)
    })
    .await
}

/// Runs one reload on the blocking pool. The store mutex serializes the two
/// endpoints within this process; the engine itself assumes a single writer.
async fn run_reload<F>(
    state: Arc<AppState>,
    group: &'static str,
    run: F,
) -> (StatusCode, Json<serde_json::Value>)
where
    F: FnOnce(&AppState, &mut Store) -> Result<ReloadReport, basemap::ReloadError>
        + Send
        + 'static,
{
    let started = Instant::now();
    let task_state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut store = task_state.store.blocking_lock();
        run(&task_state, &mut *store)
    })
    .await;

    match result {
        Ok(Ok(report)) => {
            let duration_s = started.elapsed().as_secs_f64();
            state.metrics.observe_report(&report, duration_s);
            tracing::info!(group, duration_s, report = ?report, "Reload finished");
            (
                StatusCode::OK,
                Json(serde_json::to_value(&report).expect("report serializes")),
            )
        }
        Ok(Err(err)) => {
            state
                .metrics
                .reload_failures_total
                .with_label_values(&[group])
                .inc();
            tracing::error!(group, error = %err, "Reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": err.to_string() })),
            )
        }
        Err(join_err) => {
            state
                .metrics
                .reload_failures_total
                .with_label_values(&[group])
                .inc();
            tracing::error!(group, error = %join_err, "Reload task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "reload task panicked" })),
            )
        }
    }
}

/// Listens for OS shutdown signals (SIGINT, SIGTERM) and resolves when one
/// is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
