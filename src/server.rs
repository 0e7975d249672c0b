//! HTTP surface over a [`DocumentStore`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/collections/{name}` | All documents (cached) |
//! | `POST`   | `/collections/{name}` | Append a document → `201` (auth) |
//! | `GET`    | `/collections/{name}/{id}` | One document (cached) |
//! | `PUT`    | `/collections/{name}/{id}` | Replace a document (auth) |
//! | `DELETE` | `/collections/{name}/{id}` | Remove a document → `{}` (auth) |
//! | `GET`    | `/settings` | Settings object (cached) |
//! | `PUT`    | `/settings` | Replace settings (auth) |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Every failure answers `{ "error": "<message>" }` with the status of the
//! underlying [`StoreError`]: 404 for an unknown collection or missing item,
//! 401 for a write without the shared secret, 405 for an unsupported verb on
//! a known route, 409 when the branch moved mid-commit and 500 for remote or
//! decoding failures.
//!
//! # Caching
//!
//! Successful reads carry `Cache-Control: s-maxage=60,
//! stale-while-revalidate=300` (configurable), so clients may see a write
//! only after the shared cache refreshes.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::AuthGate;
use crate::config::Config;
use crate::error::StoreError;
use crate::mirror::MirrorStore;
use crate::models::Collection;
use crate::remote::RemoteTreeClient;
use crate::store::{DocumentStore, RemoteDocumentStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn DocumentStore>,
    auth: AuthGate,
    cache_control: HeaderValue,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, auth: AuthGate, cache_control: &str) -> Self {
        Self {
            store,
            auth,
            cache_control: HeaderValue::from_str(cache_control)
                .unwrap_or_else(|_| HeaderValue::from_static("no-store")),
        }
    }
}

/// Starts the server backed by the hosted repository.
///
/// Binds to `[server].bind`; writes require the secret from
/// `[server].admin_secret_env` when that variable is set.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    config.validate_remote()?;
    let client = RemoteTreeClient::new(&config.remote)?;
    let store = RemoteDocumentStore::new(Arc::new(client), config.layout.clone());
    let auth = AuthGate::new(config.server.admin_secret());
    if !auth.is_enforced() {
        warn!(
            target: "docstore::server",
            "{} is not set: writes are accepted without a secret",
            config.server.admin_secret_env
        );
    }
    let state = AppState::new(Arc::new(store), auth, &config.cache.header_value());
    info!(
        target: "docstore::server",
        "serving {}/{}@{}",
        config.remote.owner,
        config.remote.repo,
        config.remote.branch
    );
    serve(&config.server.bind, state).await
}

/// Starts the local development server over the mirrored directories.
///
/// There is no authorization gate: the local variant assumes one operator.
pub async fn run_local_server(config: &Config) -> anyhow::Result<()> {
    let canonical = config.local.canonical_dir(&config.layout);
    let public = config.local.public_dir(&config.layout);
    let store = MirrorStore::open(&canonical, &public)?;
    let state = AppState::new(
        Arc::new(store),
        AuthGate::disabled(),
        &config.cache.header_value(),
    );
    info!(
        target: "docstore::server",
        "data files: {} (mirrored to {})",
        canonical.display(),
        public.display()
    );
    serve(&config.local.bind, state).await
}

async fn serve(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(target: "docstore::server", "listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Builds the router with all routes, CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/collections/{name}",
            get(handle_list)
                .post(handle_create)
                .fallback(handle_collection_method_not_allowed),
        )
        .route(
            "/collections/{name}/{id}",
            get(handle_get)
                .put(handle_update)
                .delete(handle_delete)
                .fallback(handle_collection_method_not_allowed),
        )
        .route(
            "/settings",
            get(handle_get_settings)
                .put(handle_put_settings)
                .fallback(handle_method_not_allowed),
        )
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// Converts a [`StoreError`] into `{ "error": message }` with its status.
pub struct AppError(StoreError);

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let message = self.0.to_string();
        if status.is_server_error() {
            error!(target: "docstore::server", "{}", message);
        } else if status == StatusCode::UNAUTHORIZED {
            warn!(target: "docstore::server", "rejected write without valid secret");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type HandlerResult = Result<Response, AppError>;

fn parse_collection(name: &str) -> Result<Collection, AppError> {
    Ok(name.parse::<Collection>()?)
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(v)| v)
        .map_err(|e| AppError(StoreError::BadRequest(e.body_text())))
}

fn cached(state: &AppState, body: Value) -> Response {
    (
        [(header::CACHE_CONTROL, state.cache_control.clone())],
        Json(body),
    )
        .into_response()
}

// ============ /collections/{name} ============

async fn handle_list(State(state): State<AppState>, Path(name): Path<String>) -> HandlerResult {
    let collection = parse_collection(&name)?;
    let items = state.store.list_collection(collection).await?;
    Ok(cached(&state, Value::Array(items)))
}

async fn handle_create(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    let collection = parse_collection(&name)?;
    state.auth.check(&headers)?;
    let body = json_body(body)?;
    let doc = state.store.append_document(collection, body).await?;
    Ok((StatusCode::CREATED, Json(doc)).into_response())
}

// ============ /collections/{name}/{id} ============

async fn handle_get(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> HandlerResult {
    let collection = parse_collection(&name)?;
    let doc = state.store.get_document(collection, &id).await?;
    Ok(cached(&state, doc))
}

async fn handle_update(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    let collection = parse_collection(&name)?;
    state.auth.check(&headers)?;
    let body = json_body(body)?;
    let doc = state.store.replace_document(collection, &id, body).await?;
    Ok(Json(doc).into_response())
}

async fn handle_delete(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> HandlerResult {
    let collection = parse_collection(&name)?;
    state.auth.check(&headers)?;
    state.store.remove_document(collection, &id).await?;
    Ok(Json(json!({})).into_response())
}

// ============ /settings ============

async fn handle_get_settings(State(state): State<AppState>) -> HandlerResult {
    let settings = state.store.get_settings().await?;
    Ok(cached(&state, settings))
}

async fn handle_put_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    state.auth.check(&headers)?;
    let body = json_body(body)?;
    let settings = state.store.update_settings(body).await?;
    Ok(Json(settings).into_response())
}

async fn handle_method_not_allowed() -> AppError {
    AppError(StoreError::MethodNotAllowed)
}

/// An unknown collection is a 404 whatever the verb.
async fn handle_collection_method_not_allowed(
    Path(params): Path<HashMap<String, String>>,
) -> AppError {
    let name = params.get("name").map(String::as_str).unwrap_or_default();
    match parse_collection(name) {
        Ok(_) => AppError(StoreError::MethodNotAllowed),
        Err(e) => e,
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
