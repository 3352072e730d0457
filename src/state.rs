//! Per-process dependencies handed to every handler.

use crate::services::{
    blob_store::BlobStore, resolver::ObjectResolver, transcoder::TicketTranscoder,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub resolver: ObjectResolver,
    pub transcoder: TicketTranscoder,
}

impl AppState {
    pub fn new(store: Arc<dyn BlobStore>, transcoder: TicketTranscoder) -> Self {
        Self {
            resolver: ObjectResolver::new(store.clone()),
            store,
            transcoder,
        }
    }
}
