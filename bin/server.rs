// Aadhaar Clean - Web Server
// Read-only REST API over the canonical tables

use aadhaar_clean::{init_logging, CanonicalStore, CanonicalTables, QueryError};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "aadhaar-server")]
#[command(about = "Aggregate query API over cleaned Aadhaar datasets")]
#[command(version)]
struct Cli {
    /// Directory holding the canonical *_clean.csv tables
    #[arg(long, default_value = "data_clean")]
    data_dir: PathBuf,

    /// Cleaning report used for the data quality score
    #[arg(long, default_value = "outputs/data_cleaning_report.json")]
    report: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: String,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<CanonicalStore>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Serialize)]
struct ServiceInfo {
    message: &'static str,
    version: &'static str,
    loaded: bool,
    endpoints: Vec<&'static str>,
}

#[derive(Deserialize)]
struct TrendsParams {
    days: Option<u32>,
}

#[derive(Deserialize)]
struct StatesParams {
    top_n: Option<usize>,
}

/// Run a query against the current snapshot, 503 when nothing is loaded
fn with_tables<T, F>(state: &AppState, query: F) -> Response
where
    T: Serialize,
    F: FnOnce(&CanonicalTables) -> T,
{
    match state.store.snapshot() {
        Ok(tables) => (StatusCode::OK, Json(ApiResponse::ok(query(&tables)))).into_response(),
        Err(QueryError::DataNotLoaded(reason)) => {
            warn!(reason = %reason, "query rejected");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::<()>::err("Data not loaded".to_string())),
            )
                .into_response()
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET / - Service info
async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(ServiceInfo {
        message: "Aadhaar Analytics API",
        version: aadhaar_clean::VERSION,
        loaded: state.store.is_loaded(),
        endpoints: vec![
            "/metrics",
            "/trends",
            "/states",
            "/states/all",
            "/demographics",
            "/anomalies",
            "/insights",
            "/refresh",
        ],
    }))
}

/// GET /metrics - Totals per dataset kind
async fn get_metrics(State(state): State<AppState>) -> Response {
    with_tables(&state, |t| t.metrics())
}

/// GET /trends?days=30 - Daily totals over a trailing window
async fn get_trends(State(state): State<AppState>, Query(params): Query<TrendsParams>) -> Response {
    let days = params.days.unwrap_or(30);
    with_tables(&state, |t| t.trends(days))
}

/// GET /states?top_n=10 - Top states by enrolment
async fn get_top_states(State(state): State<AppState>, Query(params): Query<StatesParams>) -> Response {
    let top_n = params.top_n.unwrap_or(10);
    with_tables(&state, |t| t.top_states(top_n))
}

/// GET /states/all - Every state, for map rendering
async fn get_all_states(State(state): State<AppState>) -> Response {
    with_tables(&state, |t| t.all_states())
}

/// GET /demographics - Enrolment by age bracket
async fn get_demographics(State(state): State<AppState>) -> Response {
    with_tables(&state, |t| t.demographics())
}

/// GET /anomalies
async fn get_anomalies(State(state): State<AppState>) -> Response {
    with_tables(&state, |t| t.anomalies(Utc::now()))
}

/// GET /insights
async fn get_insights(State(state): State<AppState>) -> Response {
    with_tables(&state, |t| t.insights(Utc::now()))
}

/// POST /refresh - Reload canonical tables from disk
async fn refresh(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    let result = tokio::task::spawn_blocking(move || store.refresh().map(|t| t.loaded_at)).await;

    match result {
        Ok(Ok(loaded_at)) => {
            info!(%loaded_at, "canonical tables refreshed");
            (StatusCode::OK, Json(ApiResponse::ok(loaded_at))).into_response()
        }
        Ok(Err(QueryError::DataNotLoaded(_))) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::err("Data not loaded".to_string())),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::err(e.to_string())),
        )
            .into_response(),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    println!("🌐 Aadhaar Analytics - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = Arc::new(CanonicalStore::new(&cli.data_dir, Some(cli.report.clone())));

    // Serve 503s until a successful /refresh rather than refusing to start
    match store.load() {
        Ok(tables) => println!("✓ Canonical tables loaded from {:?} at {}", cli.data_dir, tables.loaded_at),
        Err(e) => {
            eprintln!("❌ {}", e);
            eprintln!("   Run: aadhaar-clean --output-dir {}", cli.data_dir.display());
            eprintln!("   then POST /refresh.");
        }
    }

    let state = AppState { store };

    let app = Router::new()
        .route("/", get(root))
        .route("/metrics", get(get_metrics))
        .route("/trends", get(get_trends))
        .route("/states", get(get_top_states))
        .route("/states/all", get(get_all_states))
        .route("/demographics", get(get_demographics))
        .route("/anomalies", get(get_anomalies))
        .route("/insights", get(get_insights))
        .route("/refresh", post(refresh))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;

    println!("\n🚀 Server running on http://{}", cli.bind);
    println!("   API: http://{}/metrics", cli.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
