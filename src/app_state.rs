use std::sync::Arc;

use crate::config::AppConfig;
use crate::image_fetch::{ImageError, ImageFetcher};
use crate::model_client::ModelClient;

/// Shared, read-only state handed to every request:
/// - client: the model adapter (swappable in tests)
/// - fetcher: downloads images into per-request temp files
pub struct AppState {
    pub client: Arc<dyn ModelClient>,
    pub fetcher: ImageFetcher,
}

impl AppState {
    pub fn new(config: &AppConfig, client: Arc<dyn ModelClient>) -> Result<Self, ImageError> {
        Ok(Self {
            client,
            fetcher: ImageFetcher::new(config)?,
        })
    }
}
