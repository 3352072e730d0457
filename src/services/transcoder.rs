//! SVG → PNG conversion for ticket graphics.
//!
//! `TicketTranscoder` owns the ordering of the conversion path: drain the
//! whole stream, then rasterize on the blocking pool, then hand back one
//! finished PNG. Nothing is returned until the encoder has succeeded.

use crate::services::{
    blob_store::ByteStream,
    buffer::{DrainError, drain_to_buffer},
};
use bytes::Bytes;
use resvg::{
    tiny_skia::{Pixmap, Transform},
    usvg::{self, fontdb},
};
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::debug;

/// Fixed output size of a converted ticket.
pub const TICKET_WIDTH: u32 = 480;
pub const TICKET_HEIGHT: u32 = 480;

/// Default cap on the SVG bytes buffered for one conversion (8 MiB).
pub const DEFAULT_MAX_TICKET_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("ticket exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("reading ticket failed: {0}")]
    Stream(#[source] io::Error),
    #[error("conversion failed: {0}")]
    Conversion(String),
    #[error("conversion task aborted: {0}")]
    Join(String),
}

impl From<DrainError> for TranscodeError {
    fn from(err: DrainError) -> Self {
        match err {
            DrainError::TooLarge { limit } => TranscodeError::TooLarge { limit },
            DrainError::Stream { source, .. } => TranscodeError::Stream(source),
        }
    }
}

/// One conversion call: the complete SVG document and the raster size.
#[derive(Debug, Clone)]
pub struct RasterConversionRequest {
    pub source_bytes: Bytes,
    pub target_width: u32,
    pub target_height: u32,
}

impl RasterConversionRequest {
    pub fn ticket(source_bytes: Bytes) -> Self {
        Self {
            source_bytes,
            target_width: TICKET_WIDTH,
            target_height: TICKET_HEIGHT,
        }
    }
}

/// Synchronous raster engine. Runs on the blocking thread pool.
pub trait Rasterizer: Send + Sync {
    /// Render the request and return encoded PNG bytes.
    fn rasterize(&self, request: &RasterConversionRequest) -> Result<Vec<u8>, TranscodeError>;
}

/// `resvg`-backed rasterizer.
///
/// The SVG is scaled uniformly to fit the target and centred; pixels it does
/// not cover stay transparent.
pub struct SvgRasterizer {
    fontdb: Arc<fontdb::Database>,
}

impl SvgRasterizer {
    pub fn new(load_system_fonts: bool) -> Self {
        let mut db = fontdb::Database::new();
        if load_system_fonts {
            db.load_system_fonts();
            debug!("loaded {} font faces for ticket rendering", db.len());
        }
        Self {
            fontdb: Arc::new(db),
        }
    }
}

impl Rasterizer for SvgRasterizer {
    fn rasterize(&self, request: &RasterConversionRequest) -> Result<Vec<u8>, TranscodeError> {
        let options = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_data(&request.source_bytes, &options)
            .map_err(|err| TranscodeError::Conversion(err.to_string()))?;

        let (width, height) = (request.target_width as f32, request.target_height as f32);
        let size = tree.size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return Err(TranscodeError::Conversion("svg has an empty canvas".into()));
        }
        let scale = (width / size.width()).min(height / size.height());
        let offset_x = (width - size.width() * scale) / 2.0;
        let offset_y = (height - size.height() * scale) / 2.0;

        let mut pixmap = Pixmap::new(request.target_width, request.target_height).ok_or_else(
            || TranscodeError::Conversion("invalid target dimensions".into()),
        )?;
        resvg::render(
            &tree,
            Transform::from_row(scale, 0.0, 0.0, scale, offset_x, offset_y),
            &mut pixmap.as_mut(),
        );

        pixmap
            .encode_png()
            .map_err(|err| TranscodeError::Conversion(err.to_string()))
    }
}

#[derive(Clone)]
pub struct TicketTranscoder {
    rasterizer: Arc<dyn Rasterizer>,
    max_source_bytes: usize,
}

impl TicketTranscoder {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, max_source_bytes: usize) -> Self {
        Self {
            rasterizer,
            max_source_bytes,
        }
    }

    pub fn max_source_bytes(&self) -> usize {
        self.max_source_bytes
    }

    /// Buffer the whole SVG, then convert it to a 480×480 PNG.
    ///
    /// The conversion runs via `spawn_blocking`; if the caller is dropped
    /// while it runs, the task still finishes and its output is discarded.
    pub async fn transcode(&self, stream: ByteStream) -> Result<Bytes, TranscodeError> {
        let source = drain_to_buffer(stream, self.max_source_bytes).await?;
        debug!("buffered {} svg bytes for conversion", source.len());

        let request = RasterConversionRequest::ticket(source);
        let rasterizer = self.rasterizer.clone();
        let png = tokio::task::spawn_blocking(move || rasterizer.rasterize(&request))
            .await
            .map_err(|err| TranscodeError::Join(err.to_string()))??;

        Ok(Bytes::from(png))
    }
}
