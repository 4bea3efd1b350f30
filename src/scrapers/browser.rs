use crate::config::SiteConfig;
use crate::scrapers::http::HttpFetcher;
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::{FetchError, FetchedImage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Time given to client-side rendering after navigation completes
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Browser-based fetcher using headless Chrome.
/// Images are still downloaded over plain HTTP.
pub struct BrowserFetcher {
    browser: Arc<Browser>,
    images: HttpFetcher,
    listing_url: String,
    user_agent: String,
    fetch_timeout: Duration,
    detail_timeout: Duration,
}

impl BrowserFetcher {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser: Arc::new(browser),
            images: HttpFetcher::new(site)?,
            listing_url: site.listing_url.clone(),
            user_agent: site.user_agent.clone(),
            fetch_timeout: site.fetch_timeout,
            detail_timeout: site.detail_timeout,
        })
    }

    async fn render(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let browser = Arc::clone(&self.browser);
        let user_agent = self.user_agent.clone();
        let target = url.to_string();

        let task = tokio::task::spawn_blocking(move || render_blocking(&browser, &target, &user_agent, timeout));

        // Navigation has its own timeout; the outer bound catches a wedged browser.
        // A timed-out render is not cancelled: the blocking thread runs until its
        // tab-level timeouts fire, then `TabGuard` closes the tab.
        match tokio::time::timeout(timeout + SETTLE_DELAY * 2, task).await {
            Ok(Ok(Ok(html))) => Ok(html),
            Ok(Ok(Err(e))) => Err(FetchError::Browser(format!("{url}: {e:#}"))),
            Ok(Err(join)) => Err(FetchError::Browser(format!("render task failed: {join}"))),
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }
}

/// Something that owns a browser tab
trait CloseTab {
    fn close_tab(&self) -> Result<()>;
}

impl CloseTab for Tab {
    fn close_tab(&self) -> Result<()> {
        self.close(true)?;
        Ok(())
    }
}

/// Closes the tab on every exit path, including errors mid-render.
struct TabGuard<T: CloseTab> {
    tab: Arc<T>,
    url: String,
}

impl<T: CloseTab> Drop for TabGuard<T> {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close_tab() {
            warn!(url = %self.url, "Failed to close tab: {e:#}");
        }
    }
}

fn render_blocking(browser: &Browser, url: &str, user_agent: &str, timeout: Duration) -> Result<String> {
    let guard = TabGuard {
        tab: browser.new_tab().context("Failed to open tab")?,
        url: url.to_string(),
    };
    let tab = &guard.tab;
    tab.set_default_timeout(timeout);
    tab.set_user_agent(user_agent, None, None)?;

    tab.navigate_to(url)?;
    tab.wait_until_navigated()?;

    thread::sleep(SETTLE_DELAY);

    // Dismiss a cookie banner if one is present
    let _ = tab.evaluate(
        r#"
        const button = document.querySelector('button[id*="accept"], button[class*="accept"]');
        if (button) button.click();
        "#,
        false,
    );

    let html = tab.get_content().context("Failed to read page HTML")?;
    debug!(url, bytes = html.len(), "Rendered HTML");
    Ok(html)
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch_listing_page(&self) -> Result<String, FetchError> {
        self.render(&self.listing_url, self.fetch_timeout).await
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.render(url, self.detail_timeout).await
    }

    async fn fetch_image(&self, url: &str) -> Result<FetchedImage, FetchError> {
        self.images.fetch_image(url).await
    }

    fn strategy_name(&self) -> &'static str {
        "browser"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeTab {
        closes: AtomicUsize,
        fail: bool,
    }

    impl CloseTab for FakeTab {
        fn close_tab(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("target closed");
            }
            Ok(())
        }
    }

    fn render_with(tab: Arc<FakeTab>, fail_midway: bool) -> Result<String> {
        let _guard = TabGuard {
            tab,
            url: "https://sport.bazos.sk".to_string(),
        };
        if fail_midway {
            bail!("navigation timed out");
        }
        Ok("<html></html>".to_string())
    }

    #[test]
    fn tab_is_closed_after_success() {
        let tab = Arc::new(FakeTab::default());
        assert!(render_with(Arc::clone(&tab), false).is_ok());
        assert_eq!(tab.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tab_is_closed_when_render_fails() {
        let tab = Arc::new(FakeTab::default());
        assert!(render_with(Arc::clone(&tab), true).is_err());
        assert_eq!(tab.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_failure_is_swallowed() {
        let tab = Arc::new(FakeTab {
            fail: true,
            ..FakeTab::default()
        });
        assert!(render_with(Arc::clone(&tab), false).is_ok());
        assert_eq!(tab.closes.load(Ordering::SeqCst), 1);
    }
}
