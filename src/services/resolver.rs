//! Filename → `ObjectRecord` lookup shared by every read endpoint.

use crate::{
    models::object::ObjectRecord,
    services::blob_store::{BlobStore, StoreError},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no object named `{0}`")]
    NotFound(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ResolveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => ResolveError::NotFound(name),
            other => ResolveError::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct ObjectResolver {
    store: Arc<dyn BlobStore>,
}

impl ObjectResolver {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Fetch the record for `filename`.
    ///
    /// Names that could never have been generated by an upload (path
    /// separators, `..`, control characters, oversized) are treated as absent
    /// without querying the store.
    pub async fn resolve(&self, filename: &str) -> Result<ObjectRecord, ResolveError> {
        if !is_plausible_filename(filename) {
            debug!("rejecting malformed filename {:?}", filename);
            return Err(ResolveError::NotFound(filename.to_string()));
        }
        Ok(self.store.find(filename).await?)
    }
}

fn is_plausible_filename(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_FILENAME_LEN {
        return false;
    }
    if name.contains("..") {
        return false;
    }
    !name
        .chars()
        .any(|c| c.is_control() || c == '/' || c == '\\')
}
