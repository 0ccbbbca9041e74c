mod cache;
mod config;
mod metrics;

use anyhow::{Context, Result};
use assemble::{AssembleError, BatchSpec, Pipeline, PipelineConfig, PortfolioDocument, TargetPatent};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use ingest::ArchiveSet;
use reconcile::{EnrichmentIndex, EnrichmentRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::{CacheStats, PortfolioCache};
use crate::config::{AppConfig, OperationMode};
use crate::metrics::{Metrics, MetricsSnapshot, TimedOperation};

#[derive(Debug, Parser)]
#[command(name = "api", version, about = "Patent portfolio reconciliation service")]
struct Args {
    /// JSON service config; flags override it
    #[arg(long, env = "RECONCILE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, env = "RECONCILE_MODE")]
    mode: Option<OperationMode>,

    /// Directory of unpacked weekly containers
    #[arg(long, env = "PATENT_ARCHIVE_DIR")]
    archives: Option<PathBuf>,

    #[arg(long, env = "RECONCILE_BIND")]
    bind: Option<String>,

    #[arg(long, env = "RECONCILE_LOG_JSON")]
    log_json: bool,
}

struct AppState {
    archives: Arc<ArchiveSet>,
    archive_digests: Vec<String>,
    config: AppConfig,
    cache: PortfolioCache,
    metrics: Arc<Metrics>,
}

impl AppState {
    fn new(config: AppConfig, archives: ArchiveSet) -> Self {
        let archive_digests = archives
            .names()
            .filter_map(|name| archives.get(name))
            .map(|archive| archive.digest())
            .collect();
        let max_entries = if config.cache.enabled {
            config.cache.max_entries
        } else {
            0
        };

        Self {
            archives: Arc::new(archives),
            archive_digests,
            cache: PortfolioCache::new(max_entries),
            metrics: Metrics::new(),
            config,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    mode: OperationMode,
    containers: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReconcileRequest {
    patents: Vec<TargetPatent>,
    #[serde(default)]
    enrichment: BTreeMap<String, EnrichmentRecord>,
    /// Overrides the service's pipeline settings for this batch
    #[serde(default)]
    config: Option<PipelineConfig>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct StatsResponse {
    containers: Vec<String>,
    metrics: MetricsSnapshot,
    cache: CacheStats,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args).await?;

    // Initialize tracing
    if config.log_json {
        tracing_subscriber::fmt().json().init();
    } else {
        tracing_subscriber::fmt::init();
    }

    let archives = match &config.archive_dir {
        Some(dir) => ingest::load_archives(dir)
            .await
            .with_context(|| format!("Failed to load archives from {}", dir.display()))?,
        None => {
            tracing::warn!("no archive directory configured, every lookup will be not_found");
            ArchiveSet::default()
        }
    };

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, archives));
    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw).context("Failed to parse service config")?
        }
        None => AppConfig::for_mode(args.mode.unwrap_or(OperationMode::Balanced)),
    };

    if let (Some(mode), Some(_)) = (args.mode, &args.config) {
        config = config.with_mode(mode);
    }
    if let Some(dir) = &args.archives {
        config.archive_dir = Some(dir.clone());
    }
    if let Some(bind) = &args.bind {
        config.bind_addr = bind.clone();
    }
    if args.log_json {
        config.log_json = true;
    }
    Ok(config)
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/reconcile", post(reconcile_portfolio))
        .route("/stats", get(get_stats))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        mode: state.config.mode,
        containers: state.archives.len(),
    })
}

async fn reconcile_portfolio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReconcileRequest>,
) -> Result<Json<PortfolioDocument>, ApiError> {
    let timer = TimedOperation::start();

    let body = serde_json::to_vec(&req).map_err(|e| error(StatusCode::BAD_REQUEST, e))?;
    let key = state.cache.fingerprint(&body, &state.archive_digests);
    if let Some(document) = state.cache.get(&key) {
        state.metrics.record_cache_hit();
        state.metrics.record_request(true);
        return Ok(Json(document.reissued()));
    }

    let ReconcileRequest {
        patents,
        enrichment,
        config,
    } = req;
    let pipeline = Pipeline::new(
        config.unwrap_or(state.config.pipeline),
        state.archives.clone(),
        EnrichmentIndex::from_map(enrichment.into_iter().collect()),
    );

    match pipeline.run(&BatchSpec { patents }).await {
        Ok(document) => {
            let conflicts = document.reconciled().map(|r| r.conflicts.len()).sum();
            state.metrics.record_batch(
                timer.elapsed(),
                document.portfolio.record_count,
                document.portfolio.failed_count,
                conflicts,
            );
            state.metrics.record_request(true);
            state.cache.set(key, document.clone());
            Ok(Json(document))
        }
        Err(e @ AssembleError::IncompleteBatch { .. }) => {
            tracing::warn!(error = %e, "batch rejected");
            state.metrics.record_request(false);
            Err(error(StatusCode::UNPROCESSABLE_ENTITY, e))
        }
    }
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        containers: state.archives.names().map(str::to_string).collect(),
        metrics: state.metrics.snapshot(),
        cache: state.cache.stats(),
    })
}

fn error(status: StatusCode, e: impl ToString) -> ApiError {
    (status, Json(ErrorResponse { error: e.to_string() }))
}
