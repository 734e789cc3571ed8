//! HTTP server layer for the image service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      POST /upload   GET /images/{f}   POST /edit/{f}            │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    auth     │  │        routes           │  │
//! │  │ (requests)  │  │ (JWT gate)  │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::{auth_middleware, bearer_token, AuthClaims, AuthError, TokenValidator};
pub use handlers::{
    edit_handler, health_handler, image_handler, upload_handler, AppState, HealthResponse,
    ImageResponse, UPLOAD_FIELD,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
