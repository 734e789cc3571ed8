//! HTTP request handlers for the image service.
//!
//! # Endpoints
//!
//! - `POST /upload` - Store a multipart `image` upload (protected)
//! - `GET /images/{filename}` - Serve a stored image
//! - `POST /edit/{filename}` - Apply edit operations to a stored image (protected)
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::edit::{EditRequest, EditService};
use crate::error::{EditError, StorageError, UploadError};
use crate::storage::{content_type_for, ImageStore, StoredImage};

use super::auth::AuthClaims;

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "image";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Edit service, which also owns the image store
    pub edits: Arc<EditService>,
}

impl AppState {
    pub fn new(edits: EditService) -> Self {
        Self {
            edits: Arc::new(edits),
        }
    }

    pub fn store(&self) -> &ImageStore {
        self.edits.store()
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Body returned by the upload and edit endpoints.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub message: String,

    #[serde(flatten)]
    pub image: StoredImage,
}

impl ImageResponse {
    pub fn uploaded(image: StoredImage) -> Self {
        Self {
            message: "File uploaded successfully".to_string(),
            image,
        }
    }

    pub fn edited(image: StoredImage) -> Self {
        Self {
            message: "Image edited successfully".to_string(),
            image,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Client-facing bodies are short plain-text messages; causes are logged.
fn error_response(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        match &self {
            StorageError::InvalidFilename(_) => {
                warn!(status = 400, "Client error: {}", self);
                error_response(StatusCode::BAD_REQUEST, "Invalid filename.")
            }
            StorageError::NotFound(_) => {
                debug!(status = 404, "Resource not found: {}", self);
                error_response(StatusCode::NOT_FOUND, "File not found.")
            }
            StorageError::Io { .. } => {
                error!(status = 500, "Server error: {}", self);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
            }
        }
    }
}

impl IntoResponse for EditError {
    fn into_response(self) -> Response {
        match self {
            EditError::Storage(storage) => storage.into_response(),
            EditError::InvalidRequest { message } => {
                debug!(status = 400, "Rejected edit request: {}", message);
                error_response(StatusCode::BAD_REQUEST, &message)
            }
            other => {
                error!(status = 500, "Server error: {}", other);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error editing image.")
            }
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match self {
            UploadError::Storage(storage) => storage.into_response(),
            UploadError::NoFile => {
                debug!(status = 400, "Upload without an image field");
                error_response(StatusCode::BAD_REQUEST, "No file uploaded.")
            }
            UploadError::Multipart { message, status } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
                warn!(status = status.as_u16(), "Malformed upload: {}", message);
                error_response(status, &message)
            }
        }
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> UploadError {
    UploadError::Multipart {
        message: err.body_text(),
        status: err.status().as_u16(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image uploads.
///
/// # Endpoint
///
/// `POST /upload` with a `multipart/form-data` body whose `image` field is a
/// file. Other fields are ignored.
///
/// # Response
///
/// `201 Created` with JSON body:
/// ```json
/// {
///   "message": "File uploaded successfully",
///   "filename": "image-1760000000000-123456789.jpg",
///   "path": "/images/image-1760000000000-123456789.jpg"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: No `image` file in the form (or not a multipart body)
/// - `401`/`403`/`500`: Authentication failures
/// - `413 Payload Too Large`: Upload exceeds the configured limit
pub async fn upload_handler(
    State(state): State<AppState>,
    claims: AuthClaims,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ImageResponse>), UploadError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!("Upload body is not multipart: {}", rejection);
        UploadError::NoFile
    })?;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let original_name = match (field.name(), field.file_name()) {
            (Some(UPLOAD_FIELD), Some(file_name)) => file_name.to_string(),
            _ => continue,
        };

        let mut upload = state
            .store()
            .begin_upload(UPLOAD_FIELD, &original_name)
            .await?;

        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = upload.write_chunk(&chunk).await {
                        upload.abort().await;
                        return Err(e.into());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    upload.abort().await;
                    return Err(multipart_error(e));
                }
            }
        }

        let bytes = upload.bytes_written();
        let image = upload.finish().await?;
        info!(
            filename = %image.filename,
            original_name = %original_name,
            bytes,
            subject = claims.subject().unwrap_or("-"),
            "Image uploaded"
        );

        return Ok((StatusCode::CREATED, Json(ImageResponse::uploaded(image))));
    }

    Err(UploadError::NoFile)
}

/// Serve a stored image.
///
/// # Endpoint
///
/// `GET /images/{filename}`
///
/// # Response
///
/// - `200 OK`: File bytes, `Content-Type` guessed from the extension
/// - `400 Bad Request`: Filename is not a plain name (e.g. `..`)
/// - `404 Not Found`: `File not found.`
pub async fn image_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, StorageError> {
    let data = state.store().retrieve(&filename).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&filename)),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        data,
    )
        .into_response())
}

/// Apply edit operations to a stored image, replacing it.
///
/// # Endpoint
///
/// `POST /edit/{filename}` with a JSON body, either
/// `{"text": "hi", "x": 5, "y": 5}` or
/// `{"actions": [{"type": "text", ...}, {"type": "draw", ...}]}`.
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "message": "Image edited successfully",
///   "filename": "image-1760000000000-123456789.png",
///   "path": "/images/image-1760000000000-123456789.png"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unsafe filename or a body matching neither shape
/// - `401`/`403`/`500`: Authentication failures
/// - `404 Not Found`: No such image
/// - `500 Internal Server Error`: Decode, encode or I/O failure
pub async fn edit_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    claims: AuthClaims,
    body: Bytes,
) -> Result<Json<ImageResponse>, EditError> {
    if !state.store().exists(&filename).await? {
        return Err(StorageError::NotFound(filename).into());
    }

    let request = EditRequest::from_json(&body)?;
    debug!(
        filename = %filename,
        ops = request.len(),
        subject = claims.subject().unwrap_or("-"),
        "Applying edits"
    );

    let image = state.edits.apply_edits(&filename, request).await?;
    Ok(Json(ImageResponse::edited(image)))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
