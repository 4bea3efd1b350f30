use crate::models::ListingItem;
use crate::scrapers::extract::parse_selector;
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::{InlineImage, ResolvedImage};
use anyhow::{Context, Result};
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Finds an absolute image URL for a listing and optionally inlines its bytes
pub struct ImageResolver {
    base: Url,
    inline: bool,
    /// Tried in order; gallery images before any image on the page
    detail_selectors: Vec<Selector>,
}

impl ImageResolver {
    pub fn new(base_url: &str, inline: bool) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("Invalid site base URL: {base_url}"))?;
        Ok(Self {
            base,
            inline,
            detail_selectors: vec![
                parse_selector("img.carousel-cell-image")?,
                parse_selector("img")?,
            ],
        })
    }

    /// Never fails; an unresolved image yields `ResolvedImage::none()`.
    pub async fn resolve(&self, fetcher: &dyn PageFetcher, item: &ListingItem) -> ResolvedImage {
        let url = match &item.image_url {
            Some(url) => Some(url.clone()),
            None => self.from_detail_page(fetcher, item).await,
        };

        let Some(url) = url else {
            return ResolvedImage::none();
        };

        if !self.inline {
            return ResolvedImage {
                url: Some(url),
                inline: None,
            };
        }

        match fetcher.fetch_image(&url).await {
            Ok(image) => {
                debug!(id = %item.id, bytes = image.bytes.len(), media_type = %image.media_type, "Downloaded image");
                ResolvedImage {
                    inline: Some(InlineImage::encode(&image)),
                    url: Some(url),
                }
            }
            Err(e) => {
                warn!(id = %item.id, "Could not download image, submitting URL instead: {e}");
                ResolvedImage {
                    url: Some(url),
                    inline: None,
                }
            }
        }
    }

    async fn from_detail_page(&self, fetcher: &dyn PageFetcher, item: &ListingItem) -> Option<String> {
        match fetcher.fetch_page(&item.link).await {
            Ok(html) => {
                let found = self.first_image(&html);
                if found.is_none() {
                    warn!(id = %item.id, "No image on detail page");
                }
                found
            }
            Err(e) => {
                warn!(id = %item.id, "Could not fetch image for listing: {e}");
                None
            }
        }
    }

    /// First image source on the page, resolved against the site base
    pub fn first_image(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        self.detail_selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .filter_map(|img| img.value().attr("src"))
                .map(str::trim)
                .find(|src| !src.is_empty() && !src.starts_with("data:"))
                .and_then(|src| self.base.join(src).ok())
                .map(String::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ImageResolver {
        ImageResolver::new("https://sport.bazos.sk", false).unwrap()
    }

    #[test]
    fn resolves_relative_sources() {
        let html = r#"<html><body><img src="/img/1/555.jpg"></body></html>"#;
        assert_eq!(
            resolver().first_image(html).as_deref(),
            Some("https://sport.bazos.sk/img/1/555.jpg")
        );
    }

    #[test]
    fn prefers_gallery_images() {
        let html = r#"<html><body>
            <img src="https://www.bazos.sk/logo.gif">
            <img class="carousel-cell-image" src="https://www.bazos.sk/img/1/777.jpg">
        </body></html>"#;
        assert_eq!(
            resolver().first_image(html).as_deref(),
            Some("https://www.bazos.sk/img/1/777.jpg")
        );
    }

    #[test]
    fn skips_empty_and_inline_sources() {
        let html = r#"<html><body><img src=""><img src="data:image/gif;base64,R0lG"><img src="b.png"></body></html>"#;
        assert_eq!(
            resolver().first_image(html).as_deref(),
            Some("https://sport.bazos.sk/b.png")
        );
    }

    #[test]
    fn no_image_found() {
        assert_eq!(resolver().first_image("<html><body><p>x</p></body></html>"), None);
    }
}
