//! src/services/sqlite_store.rs
//!
//! SqliteBlobStore: chunked object storage inside SQLite. Metadata lives in
//! the `files` table, payloads are split into fixed-size opaque rows in the
//! `chunks` table keyed by `(files_id, n)`. Every row is scoped to one
//! logical bucket so several gateways can share a database file.

use crate::{
    models::object::{ObjectRecord, UploadMeta},
    services::blob_store::{BlobStore, ByteStream, StoreError, StoreResult, UploadStream},
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{StreamExt, stream};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    sync::Arc,
};
use tokio::runtime::Handle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Chunk size used when nothing else is configured (255 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

pub const DEFAULT_BUCKET: &str = "uploads";

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const RECORD_COLUMNS: &str =
    "id, filename, content_type, length, chunk_size, upload_date, md5, bucket";

#[derive(Clone)]
pub struct SqliteBlobStore {
    /// Shared SQLite connection pool holding both metadata and chunks.
    pub db: Arc<SqlitePool>,

    /// Logical namespace every query is scoped to.
    pub bucket: String,

    /// Payload bytes per chunk row.
    pub chunk_size: usize,
}

#[derive(Default)]
struct WrittenChunks {
    length: i64,
    count: i64,
    md5: String,
}

/// Removes the chunk rows of an upload that never got its `files` row.
///
/// Covers the case where the `put` future is dropped mid-upload (client
/// disconnect). Errors are cleaned up inline instead.
struct OrphanedChunks {
    db: Arc<SqlitePool>,
    files_id: Uuid,
    armed: bool,
}

impl OrphanedChunks {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for OrphanedChunks {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!("no runtime to remove orphaned chunks of {}", self.files_id);
            return;
        };
        let db = self.db.clone();
        let files_id = self.files_id;
        handle.spawn(async move {
            match SqliteBlobStore::remove_chunks(&db, files_id).await {
                Ok(n) => debug!("removed {} orphaned chunks of {}", n, files_id),
                Err(err) => warn!("failed to remove orphaned chunks of {}: {}", files_id, err),
            }
        });
    }
}

/// Read position inside one object's chunk sequence.
struct ChunkCursor {
    db: Arc<SqlitePool>,
    files_id: Uuid,
    filename: String,
    next: i64,
    total: i64,
}

impl SqliteBlobStore {
    pub fn new(db: Arc<SqlitePool>, bucket: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            db,
            bucket: bucket.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Apply the embedded schema. Every statement is idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        debug!("Running {} migration statements", statements.len());
        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    async fn insert_chunk(db: &SqlitePool, files_id: Uuid, n: i64, data: &[u8]) -> StoreResult<()> {
        sqlx::query("INSERT INTO chunks (files_id, n, data) VALUES (?, ?, ?)")
            .bind(files_id)
            .bind(n)
            .bind(data)
            .execute(db)
            .await?;
        Ok(())
    }

    async fn remove_chunks(db: &SqlitePool, files_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE files_id = ?")
            .bind(files_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Drain the upload into chunk rows, one autocommitted insert per chunk.
    ///
    /// No transaction is held while waiting on the client, so a slow upload
    /// never blocks other writers. The rows are unreachable until the `files`
    /// row referencing them exists.
    async fn write_chunks(
        &self,
        files_id: Uuid,
        mut upload: UploadStream<'_>,
    ) -> StoreResult<WrittenChunks> {
        let mut pending = BytesMut::with_capacity(self.chunk_size);
        let mut digest = Context::new();
        let mut written = WrittenChunks::default();

        while let Some(chunk) = upload.next().await {
            let chunk = chunk?;
            written.length += chunk.len() as i64;
            digest.consume(&chunk);
            pending.extend_from_slice(&chunk);
            while pending.len() >= self.chunk_size {
                let full = pending.split_to(self.chunk_size);
                Self::insert_chunk(&self.db, files_id, written.count, &full).await?;
                written.count += 1;
            }
        }
        if !pending.is_empty() {
            Self::insert_chunk(&self.db, files_id, written.count, &pending).await?;
            written.count += 1;
        }

        written.md5 = format!("{:x}", digest.compute());
        Ok(written)
    }

    async fn insert_record(
        &self,
        id: Uuid,
        meta: &UploadMeta,
        written: &WrittenChunks,
    ) -> StoreResult<ObjectRecord> {
        let record = sqlx::query_as::<_, ObjectRecord>(&format!(
            "INSERT INTO files (id, bucket, filename, content_type, length, chunk_size, upload_date, md5)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .bind(&self.bucket)
        .bind(meta.generate_filename())
        .bind(&meta.content_type)
        .bind(written.length)
        .bind(self.chunk_size as i64)
        .bind(Utc::now())
        .bind(&written.md5)
        .fetch_one(&*self.db)
        .await?;
        Ok(record)
    }

    fn chunk_count(length: i64, chunk_size: i64) -> i64 {
        if length <= 0 || chunk_size <= 0 {
            return 0;
        }
        (length + chunk_size - 1) / chunk_size
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    /// Stream an upload into chunk rows.
    ///
    /// Holds at most one chunk of payload in memory and computes MD5 and
    /// length on the fly. The `files` row is written last in a single
    /// statement, so a reader never sees a record without its chunks. A
    /// failed or abandoned upload has its chunk rows removed.
    async fn put(&self, meta: UploadMeta, upload: UploadStream<'_>) -> StoreResult<ObjectRecord> {
        let id = Uuid::new_v4();
        let mut orphans = OrphanedChunks {
            db: self.db.clone(),
            files_id: id,
            armed: true,
        };

        let stored = match self.write_chunks(id, upload).await {
            Ok(written) => self
                .insert_record(id, &meta, &written)
                .await
                .map(|record| (record, written.count)),
            Err(err) => Err(err),
        };

        let (record, count) = match stored {
            Ok(stored) => stored,
            Err(err) => {
                match Self::remove_chunks(&self.db, id).await {
                    Ok(n) => debug!("discarded {} chunks of failed upload {}", n, id),
                    Err(cleanup) => warn!("failed to discard chunks of {}: {}", id, cleanup),
                }
                orphans.disarm();
                return Err(err);
            }
        };
        orphans.disarm();

        debug!(
            "stored {} ({} bytes in {} chunks)",
            record.filename, record.length, count
        );
        Ok(record)
    }

    async fn find(&self, filename: &str) -> StoreResult<ObjectRecord> {
        sqlx::query_as::<_, ObjectRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM files WHERE bucket = ? AND filename = ?"
        ))
        .bind(&self.bucket)
        .bind(filename)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StoreError::NotFound(filename.to_string()),
            other => StoreError::Sqlx(other),
        })
    }

    async fn list(&self) -> StoreResult<Vec<ObjectRecord>> {
        let rows = sqlx::query_as::<_, ObjectRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM files WHERE bucket = ? ORDER BY upload_date ASC, rowid ASC"
        ))
        .bind(&self.bucket)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Delete the record and its chunks in one transaction.
    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        let result = sqlx::query("DELETE FROM files WHERE id = ? AND bucket = ?")
            .bind(id)
            .bind(&self.bucket)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let chunks = sqlx::query("DELETE FROM chunks WHERE files_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("deleted object {} and {} chunks", id, chunks.rows_affected());
        Ok(())
    }

    /// Open a lazy chunk reader.
    ///
    /// Only the record lookup happens up front; each chunk is fetched when the
    /// consumer polls for it. A chunk that disappears before it is read (the
    /// object was deleted mid-transfer) ends the stream with `UnexpectedEof`.
    async fn open_read_stream(&self, filename: &str) -> StoreResult<ByteStream> {
        let record = self.find(filename).await?;
        let cursor = ChunkCursor {
            db: self.db.clone(),
            files_id: record.id,
            filename: record.filename,
            next: 0,
            total: Self::chunk_count(record.length, record.chunk_size),
        };

        let chunks = stream::try_unfold(cursor, |mut cursor| async move {
            if cursor.next >= cursor.total {
                return Ok(None);
            }
            let data: Option<Vec<u8>> =
                sqlx::query_scalar("SELECT data FROM chunks WHERE files_id = ? AND n = ?")
                    .bind(cursor.files_id)
                    .bind(cursor.next)
                    .fetch_optional(&*cursor.db)
                    .await
                    .map_err(io::Error::other)?;

            let Some(data) = data else {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!(
                        "chunk {} of {} missing for {}",
                        cursor.next, cursor.total, cursor.filename
                    ),
                ));
            };
            cursor.next += 1;
            Ok(Some((Bytes::from(data), cursor)))
        });

        Ok(chunks.boxed())
    }

    async fn ping(&self) -> StoreResult<()> {
        let one = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if one != 1 {
            return Err(StoreError::Io(io::Error::other(format!(
                "unexpected result: {}",
                one
            ))));
        }
        Ok(())
    }
}
