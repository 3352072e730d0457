pub mod blob_store;
pub mod buffer;
pub mod resolver;
pub mod sqlite_store;
pub mod transcoder;
