use anyhow::{Context, Result};
use bike_flip_scout::ai::OpenAi;
use bike_flip_scout::analyzer::{Analyzer, AnalyzerSettings};
use bike_flip_scout::config::{Config, FetchMode, StoreConfig};
use bike_flip_scout::scrapers::{BrowserFetcher, Extractor, HttpFetcher, ImageResolver, PageFetcher};
use bike_flip_scout::store::{FirestoreStore, MemoryStore, RecordStore};
use bike_flip_scout::{Pipeline, PipelineSettings};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bike_flip_scout=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚲 Bike Flip Scout");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Scrape error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.log_redacted();

    let fetcher: Box<dyn PageFetcher> = match config.site.fetch_mode {
        FetchMode::Static => Box::new(HttpFetcher::new(&config.site)?),
        FetchMode::Browser => Box::new(BrowserFetcher::new(&config.site)?),
    };

    let store: Box<dyn RecordStore> = match &config.store {
        StoreConfig::Firestore {
            project_id,
            collection,
            auth,
        } => Box::new(FirestoreStore::connect(project_id.as_deref(), collection, auth).await?),
        StoreConfig::Memory => Box::new(MemoryStore::new()),
    };

    let mut model =
        OpenAi::new(&config.analysis.api_key, &config.analysis.model).context("Failed to create OpenAI client")?;
    if let Some(url) = &config.analysis.base_url {
        model = model.with_base_url(url);
    }
    let analyzer = Analyzer::new(
        Arc::new(model),
        AnalyzerSettings {
            max_tokens: config.analysis.max_tokens,
            response_mode: config.analysis.response_mode,
        },
    );

    let extractor = Extractor::new(&config.site.base_url)?;
    let images = ImageResolver::new(&config.site.base_url, config.analysis.inline_images)?;

    let pipeline = Pipeline {
        fetcher: fetcher.as_ref(),
        extractor: &extractor,
        images: &images,
        analyzer: &analyzer,
        store: store.as_ref(),
        settings: PipelineSettings {
            persist_degraded: config.persist_degraded,
            resale_multiplier: config.resale_multiplier,
        },
    };

    let summary = pipeline.run().await?;
    info!(
        "✅ Processed {} bikes: {} new, {} already known, {} errors",
        summary.extracted, summary.persisted, summary.skipped, summary.errored
    );

    Ok(())
}
