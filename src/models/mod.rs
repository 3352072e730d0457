//! Core data models for the gateway.
//!
//! `ObjectRecord` maps to the `files` table via `sqlx::FromRow` and
//! serializes as the JSON returned by the metadata endpoints.

pub mod object;
