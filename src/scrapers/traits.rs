use crate::scrapers::types::{FetchError, FetchedImage};
use async_trait::async_trait;

/// Retrieval strategy for listing and detail pages.
/// One implementation is chosen per deployment (static HTTP or headless Chrome).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the configured listing page
    async fn fetch_listing_page(&self) -> Result<String, FetchError>;

    /// Fetch an arbitrary page, e.g. a listing's detail page
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;

    /// Download an image's bytes
    async fn fetch_image(&self, url: &str) -> Result<FetchedImage, FetchError>;

    /// Get the name of the fetch strategy
    fn strategy_name(&self) -> &'static str;
}
