//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/cats/fetch` | Run one ingestion and report the outcome |
//! | `GET`  | `/api/cats/{id}` | One cat with its tags |
//! | `GET`  | `/api/cats?tag=&page=&pageSize=` | Paginated list, optionally filtered by tag |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/swagger/v1/swagger.json` | OpenAPI document for the routes above |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "page must be a positive integer" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! `POST /api/cats/fetch` always answers `200`; the ingestion outcome is in
//! the body's `status` field.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

use cat_harvest_core::models::{Cat, CatPage, Tag};
use cat_harvest_core::store::StoreError;

use crate::config::Config;
use crate::ingest::{build_ingestor, Cancellation, IngestReport, Ingestor};
use crate::query::{CatQuery, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub query: CatQuery,
    /// Raised on shutdown; in-flight ingestion runs stop early.
    pub shutdown: watch::Receiver<bool>,
}

/// Builds the router with all routes, CORS and request tracing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/cats/fetch", post(handle_fetch))
        .route("/api/cats/{id}", get(handle_get_cat))
        .route("/api/cats", get(handle_list_cats))
        .route("/health", get(handle_health))
        .route("/swagger/v1/swagger.json", get(handle_openapi))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// OpenAPI document generated from the handler annotations below.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cat Harvest API",
        description = "Ingests cat images with temperament tags and serves them back"
    ),
    paths(handle_fetch, handle_get_cat, handle_list_cats, handle_health),
    components(schemas(
        Cat, Tag, CatPage, FetchResponse, IngestReport, HealthResponse, ErrorBody, ErrorDetail
    )),
    tags((name = "Cats"), (name = "System"))
)]
pub struct ApiDoc;

async fn handle_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until Ctrl-C. On shutdown the cancellation signal is raised so a
/// running ingestion returns `aborted`, then in-flight requests drain.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let (ingestor, store) = build_ingestor(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = AppState {
        ingestor,
        query: CatQuery::new(store.clone()),
        shutdown: shutdown_rx,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "HTTP server listening");
    println!("cat-harvest listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    store.pool().close().await;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize, ToSchema)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize, ToSchema)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into a JSON HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidPage { .. } => bad_request(err.to_string()),
            other => {
                error!(error = %other, "store query failed");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: "An error occurred while reading cat data.".to_string(),
                }
            }
        }
    }
}

/// Parses a positive integer parameter, falling back to `default` when absent.
fn positive_param(name: &str, raw: Option<&str>, default: u32) -> Result<u32, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if v >= 1 => u32::try_from(v)
            .map_err(|_| bad_request(format!("{} is too large", name))),
        _ => Err(bad_request(format!("{} must be a positive integer", name))),
    }
}

// ============ GET /health ============

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    version: String,
}

#[utoipa::path(get, path = "/health", tag = "System",
    responses((status = 200, description = "Service is up", body = HealthResponse)))]
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/cats/fetch ============

#[derive(Serialize, ToSchema)]
struct FetchResponse {
    /// `success`, `empty`, `upstream_failure`, `store_failure`, `aborted` or `unexpected`.
    status: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<IngestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[utoipa::path(post, path = "/api/cats/fetch", tag = "Cats",
    responses((status = 200, description = "Ingestion ran; the outcome is in `status`", body = FetchResponse)))]
async fn handle_fetch(State(state): State<AppState>) -> Json<FetchResponse> {
    let outcome = state
        .ingestor
        .ingest_until(Cancellation::new(state.shutdown.clone()))
        .await;

    Json(FetchResponse {
        status: outcome.status().to_string(),
        message: outcome.message().to_string(),
        report: outcome.report().cloned(),
        error: outcome.error().map(str::to_string),
    })
}

// ============ GET /api/cats/{id} ============

#[utoipa::path(get, path = "/api/cats/{id}", tag = "Cats",
    params(("id" = i64, Path, description = "Surrogate cat id, >= 1")),
    responses(
        (status = 200, description = "The cat with its tags", body = Cat),
        (status = 400, description = "Id is not a positive integer", body = ErrorBody),
        (status = 404, description = "No cat with that id", body = ErrorBody),
    ))]
async fn handle_get_cat(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Cat>, AppError> {
    let id = match raw_id.parse::<i64>() {
        Ok(id) if id > 0 => id,
        _ => return Err(bad_request("Invalid cat ID.")),
    };

    state
        .query
        .get_cat(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("Cat with ID {} not found.", id)))
}

// ============ GET /api/cats ============

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    tag: Option<String>,
    page: Option<String>,
    #[serde(rename = "pageSize")]
    page_size: Option<String>,
}

#[utoipa::path(get, path = "/api/cats", tag = "Cats",
    params(
        ("tag" = Option<String>, Query, description = "Exact tag name; empty means no filter"),
        ("page" = Option<i64>, Query, description = "1-based page number, default 1"),
        ("pageSize" = Option<i64>, Query, description = "Cats per page, default 10"),
    ),
    responses(
        (status = 200, description = "One page of cats", body = CatPage),
        (status = 400, description = "page or pageSize is not a positive integer", body = ErrorBody),
    ))]
async fn handle_list_cats(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<CatPage>, AppError> {
    let page = positive_param("page", params.page.as_deref(), DEFAULT_PAGE)?;
    let page_size = positive_param("pageSize", params.page_size.as_deref(), DEFAULT_PAGE_SIZE)?;

    let result = state
        .query
        .list_cats(params.tag.as_deref(), page, page_size)
        .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_param() {
        assert_eq!(positive_param("page", None, 1).unwrap(), 1);
        assert_eq!(positive_param("page", Some("3"), 1).unwrap(), 3);
        assert_eq!(positive_param("page", Some(" 7 "), 1).unwrap(), 7);

        let err = positive_param("page", Some("0"), 1).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(positive_param("pageSize", Some("-2"), 10).is_err());
        assert!(positive_param("pageSize", Some("abc"), 10).is_err());
        assert!(positive_param("page", Some("99999999999"), 1).is_err());
    }

    #[test]
    fn test_store_error_mapping() {
        let err: AppError = StoreError::Backend("locked".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "internal");

        let err: AppError = StoreError::InvalidPage {
            page: 0,
            page_size: 1,
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
