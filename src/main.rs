//! Homestay association backend
//!
//! REST backend for monthly dues, organization periods and a shared document
//! library, persisted in SQLite.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod services;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use services::{
    DocumentService, DuesService, EvidenceUploader, Ledger, LocalUploader, PaymentService,
    PeriodService, SqlLedger,
};

/// Room left in a request body for multipart framing and text fields.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub dues: Arc<DuesService>,
    pub payments: Arc<PaymentService>,
    pub periods: Arc<PeriodService>,
    pub documents: Arc<DocumentService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the services to the pool, storing uploads on local disk.
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let uploader: Arc<dyn EvidenceUploader> = Arc::new(LocalUploader::new(
            config.upload_dir.clone(),
            config.public_url.clone(),
        ));
        let ledger: Arc<dyn Ledger> = Arc::new(SqlLedger);

        Self {
            dues: Arc::new(DuesService::new(pool.clone())),
            payments: Arc::new(PaymentService::new(pool.clone(), uploader.clone(), ledger)),
            periods: Arc::new(PeriodService::new(pool.clone())),
            documents: Arc::new(DocumentService::new(pool.clone(), uploader)),
            pool,
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting homestay backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Upload directory: {:?}", config.upload_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (HOMESTAY_API_PSK). Authentication is disabled!");
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let pool = db::init_database(&config.db_path).await?;

    let bind_addr = config.bind_addr;
    let app = create_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();
    let uploads_psk = psk.clone();
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let api_routes = Router::new()
        // Members and positions
        .route("/members", post(api::create_member))
        .route("/members/{id}", get(api::get_member))
        .route("/members/{id}/approval", put(api::set_member_approval))
        .route("/positions", post(api::create_position))
        .route("/positions/{id}", put(api::update_position))
        // Dues charges
        .route("/dues", get(api::list_charges).post(api::create_charge))
        .route(
            "/dues/{id}",
            get(api::get_charge)
                .put(api::update_charge)
                .delete(api::delete_charge),
        )
        .route("/dues/{id}/paid", get(api::charge_paid))
        .route("/dues/{id}/obligations", get(api::list_charge_obligations))
        // Member side
        .route("/me/dues", get(api::my_obligations))
        .route("/me/dues/{id}/payment", post(api::submit_payment))
        // Obligations
        .route("/obligations/{id}", get(api::get_obligation))
        .route("/obligations/{id}/evidence", put(api::revise_evidence))
        .route("/obligations/{id}/status", put(api::update_obligation_status))
        // Cashflows
        .route("/cashflows/income", get(api::list_income))
        // Periods
        .route("/periods", get(api::list_periods).post(api::create_period))
        .route("/periods/active", get(api::get_active_period))
        .route(
            "/periods/{id}",
            get(api::get_period)
                .put(api::update_period)
                .delete(api::delete_period),
        )
        .route("/periods/{id}/status", put(api::set_period_status))
        // Documents
        .route("/documents", get(api::list_documents).post(api::create_document))
        .route(
            "/documents/{id}",
            put(api::update_document).delete(api::delete_document),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Uploaded evidence and documents need the same key as the API
    let upload_routes = Router::new()
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(uploads_psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(upload_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
