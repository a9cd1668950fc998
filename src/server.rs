//!
//! gradebook HTTP server
//! ---------------------
//! Axum router exposing the authentication and marks endpoints.
//!
//! Responsibilities:
//! - Bearer-token authentication through the `CurrentIdentity` extractor.
//! - Role gates via the access policy in `identity::authorizer`.
//! - Dataset ingestion (multipart upload or the configured local file).
//! - Statistics and SVG charts over the current mark records.
//! - Permissive CORS and an optional `/static` directory.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::Config;
use crate::identity::{LocalAuthProvider, TokenIssuer};
use crate::storage::SharedStore;

mod auth_routes;
pub mod extract;
mod marks_routes;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub auth: Arc<LocalAuthProvider>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the record store under `config.db_root` and wire up the auth provider.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store = SharedStore::new(&config.db_root)
            .with_context(|| format!("While opening record store under {}", config.db_root.display()))?;
        let tokens = TokenIssuer::from_config(&config);
        let auth = Arc::new(LocalAuthProvider::new(store.clone(), tokens));
        Ok(Self { store, auth, config: Arc::new(config) })
    }
}

async fn welcome() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Welcome to the Student Marks Analyzer API",
        "workflow": [
            "1. Admin registers at /auth/register",
            "2. Admin logs in at /auth/login",
            "3. Admin uploads CSV at /marks/upload or loads default at /marks/load-csv",
            "4. Student accounts are auto-created (username=Name_RollNo e.g. Ishaan Rao_2210A31, password=Roll Number)",
            "5. Students login and access /auth/me to see their marks",
        ],
        "endpoints": {
            "auth": ["/auth/register (admin)", "/auth/login", "/auth/me (student)"],
            "marks_admin": ["/marks/upload", "/marks/load-csv", "PATCH /marks/{student_id}"],
            "marks_all": ["/marks/", "/marks/average", "/marks/highest", "/marks/lowest", "/marks/bar-chart", "/marks/histogram"],
        },
    }))
}

/// Build the full router. The static directory is mounted only when it exists.
pub fn router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let upload_limit = state.config.upload_limit_bytes;

    let mut app = Router::new()
        .route("/", get(welcome))
        .route("/auth/register", post(auth_routes::register))
        .route("/auth/login", post(auth_routes::login))
        .route("/auth/me", get(auth_routes::me))
        .route("/marks", get(marks_routes::list))
        .route("/marks/", get(marks_routes::list))
        .route("/marks/upload", post(marks_routes::upload))
        .route("/marks/load-csv", post(marks_routes::load_local))
        .route("/marks/average", get(marks_routes::average))
        .route("/marks/highest", get(marks_routes::highest))
        .route("/marks/lowest", get(marks_routes::lowest))
        .route("/marks/bar-chart", get(marks_routes::bar_chart))
        .route("/marks/histogram", get(marks_routes::histogram))
        .route("/marks/{student_id}", patch(marks_routes::update));

    if static_dir.is_dir() {
        app = app.nest_service("/static", ServeDir::new(static_dir));
    }

    app.layer(DefaultBodyLimit::max(upload_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server and serve until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    info!(target: "startup", ?config, "gradebook starting");
    let addr: SocketAddr = format!("{}:{}", config.bind, config.http_port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind, config.http_port))?;
    let state = AppState::new(config)?;
    let (identities, marks) = state.store.read(|t| (t.identities().len(), t.marks().len()));
    info!(target: "startup", identities, marks, "record store loaded");

    let app = router(state);
    info!(target: "startup", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!(target: "startup", "shutdown requested");
        })
        .await?;
    Ok(())
}
