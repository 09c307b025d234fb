//! Shared application state for all routes. Immutable after startup.

use crate::blob::BlobStore;
use crate::config::Settings;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>, settings: Settings) -> Self {
        AppState {
            store,
            blobs,
            settings: Arc::new(settings),
        }
    }
}
