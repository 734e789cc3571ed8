//! # Image Service
//!
//! An HTTP service for uploading, serving and editing images on local disk.
//!
//! Authenticated clients upload images as multipart form data, fetch them back
//! by their generated name, and apply edit operations (text overlay and point
//! drawing) that replace the stored file in place.
//!
//! ## Features
//!
//! - **Bearer token auth**: HMAC-signed JWTs gate the upload and edit routes
//! - **Safe storage**: Generated collision-free names, traversal-proof lookups
//! - **Serialized edits**: Concurrent edits to one file never lose updates
//! - **Format preserving**: Edited images are re-encoded in their own format
//!
//! ## Architecture
//!
//! - [`storage`] - Flat-directory image store and per-file locks
//! - [`edit`] - Edit request parsing, rendering and the edit service
//! - [`server`] - Axum-based HTTP server, auth gate and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use image_service::{create_router, EditEngine, EditService, ImageStore, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ImageStore::open("uploads").await?;
//!     let service = EditService::new(store, EditEngine::new());
//!     let router = create_router(service, RouterConfig::new(Some("secret".to_string())));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod edit;
pub mod error;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use config::{Cli, Command, ServeConfig, TokenConfig};
pub use edit::{EditEngine, EditOp, EditRequest, EditService};
pub use error::{EditError, StorageError, UploadError};
pub use server::{create_router, AppState, AuthClaims, AuthError, RouterConfig, TokenValidator};
pub use storage::{FileLocks, ImageStore, StoredImage};
