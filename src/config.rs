use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LISTING_URL: &str = "https://sport.bazos.sk/horska/?hledat=&rubriky=sport&hlokalita=90201&humkreis=25&cenaod=&cenado=150&order=&crp=&kitx=ano";
pub const DEFAULT_SITE_BASE_URL: &str = "https://sport.bazos.sk";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_COLLECTION: &str = "analyzed_bikes";

/// How the listing page is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Static,
    Browser,
}

impl FromStr for FetchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" | "http" => Ok(FetchMode::Static),
            "browser" | "chrome" => Ok(FetchMode::Browser),
            other => Err(anyhow!("unknown FETCH_MODE '{other}' (expected static|browser)")),
        }
    }
}

/// Whether the model is asked for a JSON object or free text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Json,
    Text,
}

impl FromStr for ResponseMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ResponseMode::Json),
            "text" => Ok(ResponseMode::Text),
            other => Err(anyhow!(
                "unknown ANALYSIS_RESPONSE_MODE '{other}' (expected json|text)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FirestoreAuth {
    AccessToken(String),
    /// Service-account key JSON
    ServiceAccount(String),
}

#[derive(Debug, Clone)]
pub enum StoreConfig {
    Firestore {
        /// Falls back to the service account's project when unset
        project_id: Option<String>,
        collection: String,
        auth: FirestoreAuth,
    },
    Memory,
}

/// Scraping target and client identity
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub listing_url: String,
    pub base_url: String,
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub detail_timeout: Duration,
    pub fetch_mode: FetchMode,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            base_url: DEFAULT_SITE_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout: Duration::from_secs(30),
            detail_timeout: Duration::from_secs(15),
            fetch_mode: FetchMode::Static,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub response_mode: ResponseMode,
    pub inline_images: bool,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub site: SiteConfig,
    pub analysis: AnalysisConfig,
    pub store: StoreConfig,
    pub persist_degraded: bool,
    pub resale_multiplier: f64,
}

impl Config {
    /// Load `.env` (if present) and read configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();

        let defaults = SiteConfig::default();
        let site = SiteConfig {
            listing_url: optional_env("LISTING_URL").unwrap_or(defaults.listing_url),
            base_url: optional_env("SITE_BASE_URL")
                .unwrap_or(defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            user_agent: optional_env("USER_AGENT").unwrap_or(defaults.user_agent),
            fetch_timeout: Duration::from_secs(parse_env("FETCH_TIMEOUT_SECS", 30)?),
            detail_timeout: Duration::from_secs(parse_env("DETAIL_TIMEOUT_SECS", 15)?),
            fetch_mode: parse_env("FETCH_MODE", FetchMode::Static)?,
        };

        let analysis = AnalysisConfig {
            api_key: required_env("OPENAI_API_KEY")?,
            model: optional_env("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: optional_env("OPENAI_BASE_URL"),
            max_tokens: parse_env("ANALYSIS_MAX_TOKENS", 300)?,
            response_mode: parse_env("ANALYSIS_RESPONSE_MODE", ResponseMode::Json)?,
            inline_images: parse_flag("INLINE_IMAGES", false)?,
        };

        let store = match optional_env("STORE").as_deref().unwrap_or("firestore") {
            "memory" => StoreConfig::Memory,
            "firestore" => StoreConfig::Firestore {
                project_id: optional_env("FIRESTORE_PROJECT_ID"),
                collection: optional_env("FIRESTORE_COLLECTION")
                    .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
                auth: firestore_auth()?,
            },
            other => bail!("unknown STORE '{other}' (expected firestore|memory)"),
        };

        let resale_multiplier: f64 = parse_env("RESALE_MULTIPLIER", 1.5)?;
        if !resale_multiplier.is_finite() || resale_multiplier <= 0.0 {
            bail!("RESALE_MULTIPLIER must be a positive number");
        }

        Ok(Self {
            site,
            analysis,
            store,
            persist_degraded: parse_flag("PERSIST_DEGRADED", true)?,
            resale_multiplier,
        })
    }

    /// Log the configuration without secrets.
    pub fn log_redacted(&self) {
        tracing::info!(
            listing_url = %self.site.listing_url,
            fetch_mode = ?self.site.fetch_mode,
            model = %self.analysis.model,
            response_mode = ?self.analysis.response_mode,
            inline_images = self.analysis.inline_images,
            store = self.store_name(),
            persist_degraded = self.persist_degraded,
            "Configuration loaded"
        );
    }

    fn store_name(&self) -> &'static str {
        match self.store {
            StoreConfig::Firestore { .. } => "firestore",
            StoreConfig::Memory => "memory",
        }
    }
}

fn firestore_auth() -> Result<FirestoreAuth> {
    if let Some(token) = optional_env("FIRESTORE_ACCESS_TOKEN") {
        return Ok(FirestoreAuth::AccessToken(token));
    }
    let key = optional_env("FIREBASE_KEY")
        .context("either FIRESTORE_ACCESS_TOKEN or FIREBASE_KEY must be set")?;
    Ok(FirestoreAuth::ServiceAccount(key))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required_env(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| anyhow!("{key} environment variable is required"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has invalid value '{raw}': {e}")),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, default: bool) -> Result<bool> {
    match optional_env(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("{key} must be a boolean, got '{raw}'"),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_mode_parses_aliases() {
        assert_eq!("browser".parse::<FetchMode>().unwrap(), FetchMode::Browser);
        assert_eq!(" HTTP ".parse::<FetchMode>().unwrap(), FetchMode::Static);
        assert!("curl".parse::<FetchMode>().is_err());
    }

    #[test]
    fn response_mode_parses() {
        assert_eq!("Text".parse::<ResponseMode>().unwrap(), ResponseMode::Text);
        assert!("xml".parse::<ResponseMode>().is_err());
    }

    #[test]
    fn site_defaults_point_at_bazos() {
        let site = SiteConfig::default();
        assert_eq!(site.base_url, "https://sport.bazos.sk");
        assert_eq!(site.fetch_timeout, Duration::from_secs(30));
        assert!(site.user_agent.starts_with("Mozilla/5.0"));
    }
}
