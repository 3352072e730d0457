//! Turn a resolved `ObjectRecord` into a response body.
//!
//! `serve_raw` pipes store chunks straight into the body; `serve_ticket`
//! either does the same for SVG or buffers and converts to PNG.

use crate::{
    errors::AppError,
    models::object::{ObjectRecord, PNG_CONTENT_TYPE, SVG_CONTENT_TYPE},
    services::{blob_store::BlobStore, transcoder::TranscodeError},
    state::AppState,
};
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use tracing::debug;

/// Stream the payload of `record` unmodified.
///
/// Chunks are forwarded as the store yields them. Dropping the response body
/// (client disconnect) drops the underlying store stream.
pub async fn serve_raw(
    store: &dyn BlobStore,
    record: &ObjectRecord,
    content_type: &str,
) -> Result<Response, AppError> {
    let stream = store.open_read_stream(&record.filename).await?;

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), record, content_type);
    Ok(response)
}

/// Serve an SVG ticket, converting to a 480×480 PNG when `want_png` is set.
///
/// Conversion buffers the whole document first and only builds a response
/// once the PNG is fully encoded, so a failure never yields partial bytes.
pub async fn serve_ticket(
    state: &AppState,
    record: &ObjectRecord,
    want_png: bool,
) -> Result<Response, AppError> {
    if !record.is_svg() {
        return Err(AppError::not_an_image());
    }
    if !want_png {
        return serve_raw(state.store.as_ref(), record, SVG_CONTENT_TYPE).await;
    }

    let limit = state.transcoder.max_source_bytes();
    let fits = usize::try_from(record.length).is_ok_and(|len| len <= limit);
    if !fits {
        debug!(
            "refusing to convert {} ({} bytes, limit {})",
            record.filename, record.length, limit
        );
        return Err(TranscodeError::TooLarge { limit }.into());
    }

    let stream = state.store.open_read_stream(&record.filename).await?;
    let png = state.transcoder.transcode(stream).await?;
    debug!("converted {} to {} png bytes", record.filename, png.len());

    let len = png.len();
    let mut response = Response::new(Body::from(png));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PNG_CONTENT_TYPE),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, record: &ObjectRecord, content_type: &str) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(record.length.max(0)),
    );

    if !record.md5.is_empty() {
        let quoted = format!("\"{}\"", record.md5);
        if let Ok(value) = HeaderValue::from_str(&quoted) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&record.upload_date.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
