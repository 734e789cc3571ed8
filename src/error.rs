use thiserror::Error;

/// Errors raised by the on-disk image store
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filename is not a single plain path component, or resolves outside the storage root
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    /// No stored image with this name
    #[error("File not found: {0}")]
    NotFound(String),

    /// Underlying filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that can occur while validating or applying an edit request
#[derive(Debug, Error)]
pub enum EditError {
    /// Request body matches neither accepted shape, or carries unusable values
    #[error("Invalid edit request: {message}")]
    InvalidRequest { message: String },

    /// Stored bytes could not be decoded as an image
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Edited image could not be re-encoded
    #[error("Failed to encode image: {message}")]
    Encode { message: String },

    /// The blocking worker running the edit panicked or was cancelled
    #[error("Edit task failed: {0}")]
    Task(String),

    /// Storage failure while reading or writing the image
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EditError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        EditError::InvalidRequest {
            message: message.into(),
        }
    }
}

/// Errors specific to the multipart upload endpoint
#[derive(Debug, Error)]
pub enum UploadError {
    /// No `image` file field in the form
    #[error("No file uploaded.")]
    NoFile,

    /// Multipart body could not be read (truncated stream, size limit, ...)
    #[error("Malformed upload: {message}")]
    Multipart { message: String, status: u16 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}
