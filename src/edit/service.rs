//! Edit orchestration: lock, read, edit, write back.

use std::sync::Arc;

use tracing::{debug, info};

use super::engine::EditEngine;
use super::request::EditRequest;
use crate::error::EditError;
use crate::storage::{FileLocks, ImageStore, StoredImage};

/// Applies edit requests to images in an [`ImageStore`].
///
/// Each edit holds the file's lock from read to write-back, so concurrent
/// edits of one image are applied one after another rather than clobbering
/// each other. Decoding, drawing and encoding run on the blocking pool.
pub struct EditService {
    store: ImageStore,
    locks: FileLocks,
    engine: Arc<EditEngine>,
}

impl EditService {
    pub fn new(store: ImageStore, engine: EditEngine) -> Self {
        Self {
            store,
            locks: FileLocks::new(),
            engine: Arc::new(engine),
        }
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Apply `request` to the stored image `filename`, replacing it.
    pub async fn apply_edits(
        &self,
        filename: &str,
        request: EditRequest,
    ) -> Result<StoredImage, EditError> {
        let op_count = request.len();
        let ops = request.into_ops();

        let _guard = self.locks.acquire(filename).await;
        debug!(filename, op_count, "Acquired edit lock");

        let source = self.store.retrieve(filename).await?;

        let engine = Arc::clone(&self.engine);
        let name = filename.to_string();
        let edited = tokio::task::spawn_blocking(move || engine.apply(&source, &name, &ops))
            .await
            .map_err(|e| EditError::Task(e.to_string()))??;

        self.store.replace(filename, &edited).await?;

        info!(filename, op_count, bytes = edited.len(), "Image edited");
        Ok(StoredImage::new(filename))
    }
}
