//! Router configuration for the image service.
//!
//! This module defines the HTTP routes and applies middleware for authentication,
//! upload limits and CORS.
//!
//! # Route Structure
//!
//! ```text
//! /health                 - Health check (public)
//! /images/{filename}      - Serve a stored image (public)
//! /upload                 - Multipart upload (protected)
//! /edit/{filename}        - Apply edit operations (protected)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use image_service::edit::{EditEngine, EditService};
//! use image_service::server::routes::{create_router, RouterConfig};
//! use image_service::storage::ImageStore;
//!
//! let store = ImageStore::open("uploads").await?;
//! let service = EditService::new(store, EditEngine::new());
//!
//! let config = RouterConfig::new(Some("my-secret-key".to_string()))
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(service, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{auth_middleware, TokenValidator};
use super::handlers::{edit_handler, health_handler, image_handler, upload_handler, AppState};
use crate::edit::EditService;

/// Default maximum size of an upload request body (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Shared secret for bearer token verification.
    ///
    /// `None` (or empty) leaves the server running, but every protected
    /// request fails with `500 Internal Server Error`.
    pub jwt_secret: Option<String>,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Maximum upload request body size in bytes
    pub max_upload_bytes: usize,
}

impl RouterConfig {
    /// Create a new router configuration with the given token secret.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Tracing is enabled
    /// - Uploads are limited to 10 MiB
    pub fn new(jwt_secret: Option<String>) -> Self {
        Self {
            jwt_secret,
            cors_origins: None,
            enable_tracing: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Set the maximum upload body size in bytes.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// Upload and edit routes sit behind the bearer token gate; image retrieval
/// and the health check are public. CORS applies to everything, and request
/// tracing is added when enabled.
pub fn create_router(service: EditService, config: RouterConfig) -> Router {
    let app_state = AppState::new(service);
    let validator = TokenValidator::new(config.jwt_secret.as_deref());
    let cors = build_cors_layer(&config);

    // route_layer keeps unmatched paths answering 404 instead of 401
    let protected_routes = Router::new()
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/edit/{filename}", post(edit_handler))
        .route_layer(middleware::from_fn_with_state(validator, auth_middleware));

    let public_routes = Router::new()
        .route("/images/{filename}", get(image_handler))
        .route("/health", get(health_handler));

    let router = Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
