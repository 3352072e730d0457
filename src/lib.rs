//! File gateway: chunked blob storage behind an HTTP API, with on-demand
//! SVG → PNG rendering for ticket graphics.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
