//! Represents a stored object (file) and the metadata handed to the store on upload.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";
pub const PNG_CONTENT_TYPE: &str = "image/png";
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Metadata describing one stored binary object.
///
/// The record never carries the payload itself; bytes live in the store's
/// chunk table and are read through `BlobStore::open_read_stream`.
#[derive(Serialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    /// Opaque identifier, used for deletion.
    pub id: Uuid,

    /// Generated name: 32 random hex characters plus the original extension.
    pub filename: String,

    /// MIME type recorded at upload time.
    pub content_type: String,

    /// Total size in bytes.
    pub length: i64,

    /// Size of every chunk but the last.
    pub chunk_size: i64,

    pub upload_date: DateTime<Utc>,

    /// Hex MD5 of the full payload.
    pub md5: String,

    /// Logical namespace the object was written into.
    pub bucket: String,
}

impl ObjectRecord {
    pub fn is_svg(&self) -> bool {
        self.content_type == SVG_CONTENT_TYPE
    }

    /// Raster types served by `/image/{filename}`.
    pub fn is_raster_image(&self) -> bool {
        matches!(
            self.content_type.as_str(),
            JPEG_CONTENT_TYPE | PNG_CONTENT_TYPE
        )
    }
}

/// Upload-time metadata supplied by the caller of `BlobStore::put`.
#[derive(Clone, Debug)]
pub struct UploadMeta {
    /// Name the client gave the file; only its extension survives.
    pub original_name: Option<String>,
    pub content_type: String,
}

impl UploadMeta {
    /// Extension of the original name including the leading dot, or empty.
    pub fn extension(&self) -> &str {
        let Some(name) = self.original_name.as_deref() else {
            return "";
        };
        let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
        match base.rfind('.') {
            Some(0) | None => "",
            Some(pos) => &base[pos..],
        }
    }

    /// Build a fresh random filename keeping the original extension.
    pub fn generate_filename(&self) -> String {
        format!("{}{}", Uuid::new_v4().simple(), self.extension())
    }
}

/// Guess a content type from a file extension when the upload did not declare one.
pub fn guess_content_type(name: &str) -> &'static str {
    let ext = name
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "svg" => SVG_CONTENT_TYPE,
        "png" => PNG_CONTENT_TYPE,
        "jpg" | "jpeg" => JPEG_CONTENT_TYPE,
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => OCTET_STREAM,
    }
}
