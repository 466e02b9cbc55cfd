//! # lumen-api
//!
//! HTTP RPC surface over the lumen job engine.
//!
//! Every submission endpoint registers a job and returns its identifier at
//! once; clients then poll `/getStatus` and `/getCompletion` and release the
//! job with `/unregisterJob`.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /chat` | Streamed chat completion |
//! | `POST /embed` | Text embedding |
//! | `POST /uploadFiles` | Extract, embed and store documents in a new collection |
//! | `POST /queryVectorStore` | Similarity search in an existing collection |
//! | `POST /getStatus` | Job status and queue depth |
//! | `POST /getCompletion` | Kind-specific result, partial while running |
//! | `POST /unregisterJob` | Forget a job |
//! | `GET /health` | Engine summary |

pub mod error;
pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use lumen_core::defaults;
use lumen_jobs::JobService;

pub use error::ApiError;

/// Shared router state.
#[derive(Clone)]
pub struct AppState {
    pub service: JobService,
    /// Size of the worker pool, reported by `/health`.
    pub workers: usize,
}

impl AppState {
    pub fn new(service: JobService, workers: usize) -> Self {
        Self { service, workers }
    }
}

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// CONFIGURATION HELPERS
// =============================================================================

/// Allowed CORS origins from the comma-separated `ALLOWED_ORIGINS` variable.
///
/// Unset or empty allows any origin.
pub fn parse_allowed_origins() -> AllowOrigin {
    let origins_str = std::env::var("ALLOWED_ORIGINS").unwrap_or_default();
    if origins_str.trim().is_empty() || origins_str.trim() == "*" {
        return AllowOrigin::any();
    }

    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    AllowOrigin::list(origins)
}

/// Request body cap from `MAX_BODY_SIZE_BYTES`.
pub fn max_body_size() -> usize {
    std::env::var("MAX_BODY_SIZE_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(defaults::MAX_BODY_SIZE_BYTES)
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the application router with its middleware stack.
pub fn router(state: AppState) -> Router {
    let body_limit = max_body_size();

    let routes: [(&str, MethodRouter<AppState>); 8] = [
        // Submissions
        ("/chat", post(handlers::jobs::submit_chat)),
        ("/embed", post(handlers::jobs::submit_embed)),
        ("/uploadFiles", post(handlers::jobs::upload_files)),
        ("/queryVectorStore", post(handlers::jobs::query_vector_store)),
        // Polling
        ("/getStatus", post(handlers::status::get_status)),
        ("/getCompletion", post(handlers::status::get_completion)),
        ("/unregisterJob", post(handlers::status::unregister_job)),
        ("/health", get(handlers::status::health)),
    ];

    // Existing clients call every route with a trailing slash
    let mut app = Router::new();
    for (path, handler) in routes {
        app = app
            .route(path, handler.clone())
            .route(&format!("{}/", path), handler);
    }

    app
        // Middleware
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(parse_allowed_origins())
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .max_age(std::time::Duration::from_secs(3600)),
        )
        // Base64 uploads exceed the extractor default
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
