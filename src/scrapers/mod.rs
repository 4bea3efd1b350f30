pub mod browser;
pub mod extract;
pub mod http;
pub mod images;
pub mod traits;
pub mod types;

pub use browser::BrowserFetcher;
pub use extract::Extractor;
pub use http::HttpFetcher;
pub use images::ImageResolver;
pub use traits::PageFetcher;
pub use types::{FetchError, FetchedImage, InlineImage, ResolvedImage};
