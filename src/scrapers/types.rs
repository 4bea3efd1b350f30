use base64::Engine;
use thiserror::Error;

/// Failure while retrieving a page or an image
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timed out after {secs}s fetching {url}")]
    Timeout { url: String, secs: u64 },

    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Image at {url} is {bytes} bytes, over the {limit} byte limit")]
    TooLarge { url: String, bytes: u64, limit: u64 },

    #[error("Browser error: {0}")]
    Browser(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

/// Raw image bytes as downloaded
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Image bytes ready for inline submission
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub media_type: String,
    /// Base64 (standard alphabet)
    pub data: String,
}

impl InlineImage {
    pub fn encode(image: &FetchedImage) -> Self {
        Self {
            media_type: image.media_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
        }
    }
}

/// Outcome of image resolution for one listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedImage {
    pub url: Option<String>,
    pub inline: Option<InlineImage>,
}

impl ResolvedImage {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.url.is_some() || self.inline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_image_is_base64_encoded() {
        let image = FetchedImage {
            media_type: "image/png".into(),
            bytes: b"abc".to_vec(),
        };
        let inline = InlineImage::encode(&image);
        assert_eq!(inline.data, "YWJj");
        assert_eq!(inline.media_type, "image/png");
    }

    #[test]
    fn resolved_image_presence() {
        assert!(!ResolvedImage::none().is_present());
        let with_url = ResolvedImage {
            url: Some("https://x/y.jpg".into()),
            inline: None,
        };
        assert!(with_url.is_present());
    }
}
