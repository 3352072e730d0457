//! Accumulate a `ByteStream` into one contiguous buffer.
//!
//! This is the only place on the read path that holds a whole object in
//! memory, so the size limit lives here too.

use crate::services::blob_store::ByteStream;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrainError {
    #[error("stream exceeded {limit} bytes")]
    TooLarge { limit: usize },
    #[error("stream failed after {read} bytes: {source}")]
    Stream {
        read: usize,
        #[source]
        source: io::Error,
    },
}

/// Read `stream` to the end, appending every chunk in order.
///
/// Fails as soon as the running total passes `limit`; the stream is dropped
/// (and thereby closed) on every exit path.
pub async fn drain_to_buffer(mut stream: ByteStream, limit: usize) -> Result<Bytes, DrainError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| DrainError::Stream {
            read: buf.len(),
            source,
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(DrainError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
