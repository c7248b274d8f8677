use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::docs::{DocsCache, DocsRefreshHandler, DocsRegenerator, library_swagger};
use crate::library::{self, Library};
use crate::webhook::{WebhookStats, webhook_handler};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use hook_core::model::PUSH_EVENT;
use serde_json::{Value, json};
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub dispatcher: Dispatcher,
    pub docs: DocsCache,
    pub library: Library,
    pub stats: WebhookStats,
}

impl AppState {
    /// Wires the push handler to `regenerator` and seeds the docs snapshot.
    pub fn new(config: Config, regenerator: Arc<dyn DocsRegenerator>) -> Self {
        let docs = DocsCache::new(library_swagger(None));
        let dispatcher = Dispatcher::builder(config.dispatch_timeout)
            .on(
                PUSH_EVENT,
                Arc::new(DocsRefreshHandler::new(
                    regenerator,
                    docs.clone(),
                    config.docs_refs.clone(),
                )),
            )
            .build();

        Self {
            config,
            dispatcher,
            docs,
            library: Library::in_memory(),
            stats: WebhookStats::default(),
        }
    }
}

/// All routes except rate limiting, which `main` layers on top.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.webhook_path, post(webhook_handler))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/swagger.json", get(swagger_json))
        .merge(library::routes())
        .layer(DefaultBodyLimit::max(state.config.max_payload_bytes))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "bind": state.config.bind_addr,
            "webhook_path": state.config.webhook_path,
            "version": env!("CARGO_PKG_VERSION"),
            "webhook": state.stats.snapshot(),
        })),
    )
}

async fn swagger_json(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.docs.snapshot().as_ref().clone())
}
