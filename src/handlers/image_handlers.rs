//! Read endpoints that return object bytes: raster images and SVG tickets.

use crate::{
    errors::AppError,
    handlers::responders::{serve_raw, serve_ticket},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
};

/// Output requested through `/ticket/{filename}/{kind}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketFormat {
    Svg,
    Png,
}

impl TicketFormat {
    /// Any numeric spelling of one (`1`, `01`, `1.0`, `1e0`) selects PNG;
    /// every other value falls back to the stored SVG.
    pub fn from_path_segment(segment: &str) -> Self {
        match segment.trim().parse::<f64>() {
            Ok(value) if value == 1.0 => TicketFormat::Png,
            _ => TicketFormat::Svg,
        }
    }
}

/// `GET /image/{filename}`: stream a stored JPEG or PNG.
pub async fn get_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let record = state.resolver.resolve(&filename).await?;
    if !record.is_raster_image() {
        return Err(AppError::not_an_image());
    }
    serve_raw(state.store.as_ref(), &record, &record.content_type).await
}

/// `GET /ticket/{filename}`: stream a stored SVG unchanged.
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let record = state.resolver.resolve(&filename).await?;
    serve_ticket(&state, &record, false).await
}

/// `GET /ticket/{filename}/{kind}`: SVG, or a 480×480 PNG when `kind` is `1`.
pub async fn get_ticket_as(
    State(state): State<AppState>,
    Path((filename, kind)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let record = state.resolver.resolve(&filename).await?;
    let format = TicketFormat::from_path_segment(&kind);
    serve_ticket(&state, &record, format == TicketFormat::Png).await
}
