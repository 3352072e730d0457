//! HTTP handlers for upload, metadata lookup, listing and deletion.
//! Upload bodies are streamed into the store chunk by chunk.

use crate::{
    errors::{AppError, NO_FILES_EXIST},
    models::object::{OCTET_STREAM, ObjectRecord, UploadMeta, guess_content_type},
    services::blob_store::StoreError,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
};
use futures::StreamExt;
use serde_json::{Value, json};
use std::io;
use tracing::info;
use uuid::Uuid;

/// `POST /upload`: store the multipart field named `file`.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .filter(|ct| !ct.is_empty() && *ct != OCTET_STREAM)
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(original_name.as_deref().unwrap_or("")).into());
        let meta = UploadMeta {
            original_name,
            content_type,
        };

        let upload = field
            .map(|chunk| chunk.map_err(io::Error::other))
            .boxed();
        let record = state.store.put(meta, upload).await.map_err(upload_error)?;

        info!(
            "uploaded {} ({}, {} bytes)",
            record.filename, record.content_type, record.length
        );
        return Ok(Json(json!({ "file": record })));
    }

    Err(AppError::new(StatusCode::BAD_REQUEST, "No file uploaded"))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}

/// Store failures that originate in the multipart body keep the status the
/// framework assigned them, e.g. 413 once the body limit is exceeded.
fn upload_error(err: StoreError) -> AppError {
    if let StoreError::Io(io_err) = &err {
        if let Some(multipart) = io_err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
        {
            return AppError::new(multipart.status(), multipart.body_text());
        }
    }
    err.into()
}

/// `GET /files`: every stored record.
pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<ObjectRecord>>, AppError> {
    let files = state.store.list().await?;
    if files.is_empty() {
        return Err(AppError::not_found(NO_FILES_EXIST));
    }
    Ok(Json(files))
}

/// `GET /files/{filename}`: metadata of one record.
pub async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<ObjectRecord>, AppError> {
    let record = state.resolver.resolve(&filename).await?;
    Ok(Json(record))
}

/// `DELETE /files/{id}`: remove a record and its payload.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::no_file())?;
    state.store.delete(id).await?;

    info!("deleted object {}", id);
    Ok(Json(json!({ "status": "success" })))
}
