//! Local-directory image store.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use rand::Rng;
use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::StorageError;

/// URL prefix under which stored images are served.
pub const PUBLIC_PATH_PREFIX: &str = "/images";

/// How many fresh names to try before giving up on an upload.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Upper bound (inclusive) of the random component in generated names.
const RANDOM_SUFFIX_MAX: u32 = 1_000_000_000;

// =============================================================================
// Stored Image
// =============================================================================

/// A stored image as reported back to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    /// Generated filename, relative to the storage root
    pub filename: String,

    /// Public URL path the image is served from
    pub path: String,
}

impl StoredImage {
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let path = format!("{}/{}", PUBLIC_PATH_PREFIX, filename);
        Self { filename, path }
    }
}

// =============================================================================
// Filename Generation
// =============================================================================

/// Generate a unique name for an upload.
///
/// The result is `<field>-<unix-millis>-<random><ext>`, where `ext` is the
/// final extension of `original_name` (with its leading dot) when it is
/// plain ASCII alphanumeric, and empty otherwise. The form field is reduced
/// to `[A-Za-z0-9_-]` so the result is always a single safe path component.
pub fn generate_filename(field: &str, original_name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: u32 = rand::rng().random_range(0..=RANDOM_SUFFIX_MAX);

    format!(
        "{}-{}-{}{}",
        sanitize_field(field),
        millis,
        suffix,
        extension_of(original_name)
    )
}

fn sanitize_field(field: &str) -> String {
    let cleaned: String = field
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

/// MIME type to serve a stored file with, guessed from its extension.
pub fn content_type_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Check that a client-supplied name is exactly one plain path component.
fn validate_filename(filename: &str) -> Result<(), StorageError> {
    let invalid = || StorageError::InvalidFilename(filename.to_string());

    if filename.is_empty() || filename.contains(['/', '\\', '\0']) {
        return Err(invalid());
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

// =============================================================================
// Image Store
// =============================================================================

/// Image files kept in one flat directory.
///
/// The store never trusts a filename it did not generate: every lookup goes
/// through [`ImageStore::resolve`], and existing files are additionally
/// canonicalized so a symlink cannot lead outside the root.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Open (creating if needed) the storage root.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        let display = root.display().to_string();

        fs::create_dir_all(root)
            .await
            .map_err(|e| StorageError::io(&display, e))?;
        let root = fs::canonicalize(root)
            .await
            .map_err(|e| StorageError::io(&display, e))?;

        debug!(root = %root.display(), "Opened image store");
        Ok(Self { root })
    }

    /// Canonical storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a validated filename onto the root.
    ///
    /// This performs no filesystem access; see [`ImageStore::exists`] for the
    /// checks applied to files that are actually present.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, StorageError> {
        validate_filename(filename)?;
        Ok(self.root.join(filename))
    }

    /// Locate an existing regular file, or `None` if there is none.
    async fn locate(&self, filename: &str) -> Result<Option<PathBuf>, StorageError> {
        let path = self.resolve(filename)?;

        let canonical = match fs::canonicalize(&path).await {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(filename, e)),
        };

        if !canonical.starts_with(&self.root) {
            warn!(filename, "Rejected filename resolving outside the storage root");
            return Err(StorageError::InvalidFilename(filename.to_string()));
        }

        match fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => Ok(Some(canonical)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(filename, e)),
        }
    }

    /// Whether a stored image with this name exists.
    pub async fn exists(&self, filename: &str) -> Result<bool, StorageError> {
        Ok(self.locate(filename).await?.is_some())
    }

    /// Read a stored image.
    pub async fn retrieve(&self, filename: &str) -> Result<Bytes, StorageError> {
        let path = self
            .locate(filename)
            .await?
            .ok_or_else(|| StorageError::NotFound(filename.to_string()))?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(filename.to_string()))
            }
            Err(e) => Err(StorageError::io(filename, e)),
        }
    }

    /// Overwrite an existing image.
    ///
    /// The new content is written to a sibling temp file and renamed over the
    /// original, so readers see either the old or the new bytes.
    pub async fn replace(&self, filename: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self
            .locate(filename)
            .await?
            .ok_or_else(|| StorageError::NotFound(filename.to_string()))?;

        let suffix: u32 = rand::rng().random_range(0..=RANDOM_SUFFIX_MAX);
        let temp_path = self.root.join(format!(".{}.{}.tmp", filename, suffix));

        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::io(filename, e));
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::io(filename, e));
        }

        debug!(filename, bytes = data.len(), "Replaced stored image");
        Ok(())
    }

    /// Create a new, uniquely named file for an incoming upload.
    ///
    /// Files are opened with `create_new`, so an existing image is never
    /// overwritten; on the (unlikely) collision a fresh name is generated.
    pub async fn begin_upload(
        &self,
        field: &str,
        original_name: &str,
    ) -> Result<PendingUpload, StorageError> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let filename = generate_filename(field, original_name);
            let path = self.root.join(&filename);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    return Ok(PendingUpload {
                        file,
                        guard: PartialFileGuard::new(path),
                        image: StoredImage::new(filename),
                        bytes_written: 0,
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(filename, "Generated name already taken, retrying");
                    continue;
                }
                Err(e) => return Err(StorageError::io(filename, e)),
            }
        }

        Err(StorageError::io(
            original_name,
            std::io::Error::new(ErrorKind::AlreadyExists, "could not allocate a unique filename"),
        ))
    }

    /// Store a complete upload held in memory.
    pub async fn store(
        &self,
        field: &str,
        original_name: &str,
        data: &[u8],
    ) -> Result<StoredImage, StorageError> {
        let mut upload = self.begin_upload(field, original_name).await?;
        if let Err(e) = upload.write_chunk(data).await {
            upload.abort().await;
            return Err(e);
        }
        upload.finish().await
    }
}

// =============================================================================
// Pending Upload
// =============================================================================

/// A freshly created file being filled with upload bytes.
///
/// Call [`PendingUpload::finish`] once all chunks are written, or
/// [`PendingUpload::abort`] to remove the partial file. Dropping it without
/// finishing (e.g. when the client disconnects mid-upload) also removes the
/// file.
pub struct PendingUpload {
    // Declared before `guard` so the handle is closed before removal
    file: File,
    guard: PartialFileGuard,
    image: StoredImage,
    bytes_written: u64,
}

impl PendingUpload {
    /// The image this upload will become.
    pub fn image(&self) -> &StoredImage {
        &self.image
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| StorageError::io(&self.image.filename, e))?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StoredImage, StorageError> {
        if let Err(e) = self.file.flush().await {
            let err = StorageError::io(&self.image.filename, e);
            self.abort().await;
            return Err(err);
        }
        self.guard.disarm();
        debug!(
            filename = %self.image.filename,
            bytes = self.bytes_written,
            "Stored upload"
        );
        Ok(self.image)
    }

    pub async fn abort(self) {
        let PendingUpload { file, mut guard, .. } = self;
        drop(file);
        guard.disarm();
        if let Err(e) = fs::remove_file(&guard.path).await {
            warn!(path = %guard.path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}

/// Removes a partially written file on drop unless disarmed.
struct PartialFileGuard {
    path: PathBuf,
    armed: bool,
}

impl PartialFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFileGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed abandoned upload"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove abandoned upload")
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
