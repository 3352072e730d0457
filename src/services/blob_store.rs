//! The storage seam the read path depends on.
//!
//! Handlers and the resolver only ever see `dyn BlobStore`; the SQLite
//! implementation lives in `sqlite_store`, tests plug in in-memory fakes.

use crate::models::object::{ObjectRecord, UploadMeta};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;
use thiserror::Error;
use uuid::Uuid;

/// Lazy, single-pass sequence of payload chunks for one object.
///
/// Dropping the stream releases whatever the store holds for it.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Borrowed upload body handed to `put`.
pub type UploadStream<'a> = BoxStream<'a, io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `stream` as a new object and return its record.
    async fn put(&self, meta: UploadMeta, stream: UploadStream<'_>) -> StoreResult<ObjectRecord>;

    /// Look up an object by its generated filename.
    async fn find(&self, filename: &str) -> StoreResult<ObjectRecord>;

    /// All objects in the bucket, oldest first.
    async fn list(&self) -> StoreResult<Vec<ObjectRecord>>;

    /// Remove an object and its payload.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Open the payload of `filename` for reading.
    async fn open_read_stream(&self, filename: &str) -> StoreResult<ByteStream>;

    /// Cheap connectivity check used by the readiness probe.
    async fn ping(&self) -> StoreResult<()>;
}
