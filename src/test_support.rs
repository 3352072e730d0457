//! In-memory fakes shared by the unit and HTTP tests.

use crate::{
    models::object::{ObjectRecord, UploadMeta},
    services::{
        blob_store::{BlobStore, ByteStream, StoreError, StoreResult, UploadStream},
        transcoder::{RasterConversionRequest, Rasterizer, TranscodeError},
    },
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{Stream, StreamExt, stream};
use std::{
    io,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    task::{Context, Poll},
};
use uuid::Uuid;

pub const TICKET_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="240" height="120" viewBox="0 0 240 120">
  <rect x="4" y="4" width="232" height="112" rx="12" fill="#1d3557"/>
  <circle cx="60" cy="60" r="30" fill="#e63946"/>
</svg>"##;

/// Split `svg` into a stream of `chunk`-sized pieces.
pub fn svg_stream(svg: &'static str, chunk: usize) -> ByteStream {
    let pieces: Vec<io::Result<Bytes>> = svg
        .as_bytes()
        .chunks(chunk.max(1))
        .map(|c| Ok(Bytes::from_static(c)))
        .collect();
    stream::iter(pieces).boxed()
}

enum Payload {
    Data(Bytes),
    /// `len` zero bytes, produced lazily from one shared chunk.
    Synthetic(usize),
}

/// Counters shared between a `FakeStore` and every stream it hands out.
#[derive(Default)]
pub struct StreamProbe {
    produced: AtomicUsize,
    open: AtomicUsize,
    opened: AtomicUsize,
}

impl StreamProbe {
    /// Bytes yielded by all streams so far.
    pub fn produced(&self) -> usize {
        self.produced.load(Ordering::SeqCst)
    }

    /// Streams currently alive.
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Streams ever opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

/// How a probed stream misbehaves after emitting a number of chunks.
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    Error(usize),
    Stall(usize),
}

struct ProbedStream {
    chunks: Vec<Bytes>,
    next: usize,
    fault: Option<Fault>,
    probe: Arc<StreamProbe>,
}

impl Stream for ProbedStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.fault {
            Some(Fault::Error(after)) if self.next == after => {
                self.next += 1;
                return Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "chunk vanished",
                ))));
            }
            Some(Fault::Stall(after)) if self.next >= after => return Poll::Pending,
            _ => {}
        }
        if self.next >= self.chunks.len() {
            return Poll::Ready(None);
        }
        let chunk = self.chunks[self.next].clone();
        self.next += 1;
        self.probe.produced.fetch_add(chunk.len(), Ordering::SeqCst);
        Poll::Ready(Some(Ok(chunk)))
    }
}

impl Drop for ProbedStream {
    fn drop(&mut self) {
        self.probe.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// `BlobStore` kept entirely in memory, with call counters and fault injection.
pub struct FakeStore {
    objects: Mutex<Vec<(ObjectRecord, Payload)>>,
    chunk_size: usize,
    fault: Mutex<Option<Fault>>,
    find_calls: AtomicUsize,
    pub probe: Arc<StreamProbe>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Self::with_chunk_size(4)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Arc<Self> {
        Arc::new(Self {
            objects: Mutex::new(Vec::new()),
            chunk_size: chunk_size.max(1),
            fault: Mutex::new(None),
            find_calls: AtomicUsize::new(0),
            probe: Arc::new(StreamProbe::default()),
        })
    }

    fn record(&self, filename: &str, content_type: &str, length: usize, md5: String) -> ObjectRecord {
        ObjectRecord {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            length: length as i64,
            chunk_size: self.chunk_size as i64,
            upload_date: Utc::now(),
            md5,
            bucket: "uploads".into(),
        }
    }

    pub fn insert(&self, filename: &str, content_type: &str, data: Vec<u8>) -> ObjectRecord {
        let record = self.record(
            filename,
            content_type,
            data.len(),
            format!("{:x}", md5::compute(&data)),
        );
        self.objects
            .lock()
            .unwrap()
            .push((record.clone(), Payload::Data(Bytes::from(data))));
        record
    }

    /// Register an object of `len` zero bytes without allocating it.
    pub fn insert_synthetic(&self, filename: &str, content_type: &str, len: usize) -> ObjectRecord {
        let record = self.record(filename, content_type, len, String::new());
        self.objects
            .lock()
            .unwrap()
            .push((record.clone(), Payload::Synthetic(len)));
        record
    }

    /// Make every stream opened from now on misbehave.
    pub fn inject(&self, fault: Fault) {
        *self.fault.lock().unwrap() = Some(fault);
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    fn chunks_of(&self, payload: &Payload) -> Vec<Bytes> {
        match payload {
            Payload::Data(bytes) => (0..bytes.len())
                .step_by(self.chunk_size)
                .map(|start| bytes.slice(start..(start + self.chunk_size).min(bytes.len())))
                .collect(),
            Payload::Synthetic(len) => {
                let full = Bytes::from(vec![0u8; self.chunk_size]);
                (0..*len)
                    .step_by(self.chunk_size)
                    .map(|start| full.slice(0..self.chunk_size.min(len - start)))
                    .collect()
            }
        }
    }
}

#[async_trait]
impl BlobStore for FakeStore {
    async fn put(&self, meta: UploadMeta, mut upload: UploadStream<'_>) -> StoreResult<ObjectRecord> {
        let mut data = BytesMut::new();
        while let Some(chunk) = upload.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(self.insert(&meta.generate_filename(), &meta.content_type, data.to_vec()))
    }

    async fn find(&self, filename: &str) -> StoreResult<ObjectRecord> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(record, _)| record.filename == filename)
            .map(|(record, _)| record.clone())
            .ok_or_else(|| StoreError::NotFound(filename.to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<ObjectRecord>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|(record, _)| record.clone())
            .collect())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|(record, _)| record.id != id);
        if objects.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn open_read_stream(&self, filename: &str) -> StoreResult<ByteStream> {
        let chunks = {
            let objects = self.objects.lock().unwrap();
            let (_, payload) = objects
                .iter()
                .find(|(record, _)| record.filename == filename)
                .ok_or_else(|| StoreError::NotFound(filename.to_string()))?;
            self.chunks_of(payload)
        };
        self.probe.open.fetch_add(1, Ordering::SeqCst);
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ProbedStream {
            chunks,
            next: 0,
            fault: *self.fault.lock().unwrap(),
            probe: self.probe.clone(),
        }
        .boxed())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Returns a fixed payload and remembers every request it was given.
#[derive(Default)]
pub struct RecordingRasterizer {
    seen: Mutex<Vec<RasterConversionRequest>>,
}

impl RecordingRasterizer {
    pub const OUTPUT: &'static [u8] = b"\x89PNG-fake";

    pub fn requests(&self) -> Vec<RasterConversionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Rasterizer for RecordingRasterizer {
    fn rasterize(&self, request: &RasterConversionRequest) -> Result<Vec<u8>, TranscodeError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(Self::OUTPUT.to_vec())
    }
}

pub struct FailingRasterizer;

impl Rasterizer for FailingRasterizer {
    fn rasterize(&self, _request: &RasterConversionRequest) -> Result<Vec<u8>, TranscodeError> {
        Err(TranscodeError::Conversion("engine refused input".into()))
    }
}
