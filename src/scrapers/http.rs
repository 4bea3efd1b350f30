use crate::config::SiteConfig;
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::{FetchError, FetchedImage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";
/// Largest image accepted for inline submission
const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Static HTML fetcher backed by reqwest
pub struct HttpFetcher {
    client: Client,
    listing_url: String,
    fetch_timeout: Duration,
    detail_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(site.fetch_timeout)
            .user_agent(site.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            listing_url: site.listing_url.clone(),
            fetch_timeout: site.fetch_timeout,
            detail_timeout: site.detail_timeout,
        })
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, FetchError> {
        debug!(url, "Fetching");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let response = self.get(url, timeout).await?;
        let html = response.text().await.map_err(|e| classify(url, timeout, e))?;
        debug!(url, bytes = html.len(), "Downloaded HTML");
        Ok(html)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_listing_page(&self) -> Result<String, FetchError> {
        self.get_text(&self.listing_url, self.fetch_timeout).await
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.get_text(url, self.detail_timeout).await
    }

    async fn fetch_image(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let response = self.get(url, self.detail_timeout).await?;
        if let Some(declared) = response.content_length() {
            check_image_size(url, declared)?;
        }

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(url, self.detail_timeout, e))?;
        // Chunked responses carry no length up front.
        check_image_size(url, bytes.len() as u64)?;

        Ok(FetchedImage {
            media_type,
            bytes: bytes.to_vec(),
        })
    }

    fn strategy_name(&self) -> &'static str {
        "static"
    }
}

fn check_image_size(url: &str, bytes: u64) -> Result<(), FetchError> {
    if bytes > MAX_IMAGE_BYTES {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            bytes,
            limit: MAX_IMAGE_BYTES,
        });
    }
    Ok(())
}

fn classify(url: &str, timeout: Duration, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_site() {
        let fetcher = HttpFetcher::new(&SiteConfig::default()).unwrap();
        assert_eq!(fetcher.strategy_name(), "static");
        assert_eq!(fetcher.fetch_timeout, Duration::from_secs(30));
        assert_eq!(fetcher.detail_timeout, Duration::from_secs(15));
    }

    #[test]
    fn oversized_images_are_refused() {
        assert!(check_image_size("https://www.bazos.sk/img/1/1.jpg", 200_000).is_ok());
        assert!(check_image_size("https://www.bazos.sk/img/1/1.jpg", MAX_IMAGE_BYTES).is_ok());

        let err = check_image_size("https://www.bazos.sk/img/1/1.jpg", MAX_IMAGE_BYTES + 1).unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: MAX_IMAGE_BYTES, .. }));
        assert!(!err.is_timeout());
    }
}
