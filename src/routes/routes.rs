//! Defines the HTTP surface of the gateway.
//!
//! ## Structure
//! - **Object endpoints**
//!   - `POST   /upload`                  - multipart upload (field `file`)
//!   - `GET    /files`                   - list all records
//!   - `GET    /files/{file}`            - record metadata by filename
//!   - `DELETE /files/{file}`            - delete by record id
//!
//! - **Byte endpoints**
//!   - `GET    /image/{filename}`        - stream a JPEG/PNG
//!   - `GET    /ticket/{filename}`       - stream an SVG
//!   - `GET    /ticket/{filename}/{kind}` - SVG, or 480×480 PNG when `kind` is `1`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        image_handlers::{get_image, get_ticket, get_ticket_as},
        object_handlers::{delete_file, get_file, list_files, upload_file},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Build and return the router for all endpoints.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/upload",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/files", get(list_files))
        // GET looks up by filename, DELETE by record id.
        .route("/files/{file}", get(get_file).delete(delete_file))
        .route("/image/{filename}", get(get_image))
        .route("/ticket/{filename}", get(get_ticket))
        .route("/ticket/{filename}/{kind}", get(get_ticket_as))
}

/// Build the CORS layer from the configured origin list.
pub fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let mut allowed = Vec::with_capacity(origins.len());
    for origin in origins {
        allowed.push(origin.parse::<HeaderValue>()?);
    }

    Ok(CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any))
}

/// Full application: routes, state, CORS and request tracing.
pub fn app(state: AppState, origins: &[String], max_upload_bytes: usize) -> anyhow::Result<Router> {
    let router = routes(max_upload_bytes)
        .with_state(state)
        .layer(cors_layer(origins)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );
    Ok(router)
}
