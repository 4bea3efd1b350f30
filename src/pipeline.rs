//! One scrape run: fetch -> extract -> per item (dedup -> image -> analyze -> persist).
//!
//! Items are processed strictly in extraction order, one at a time. Only the
//! listing fetch is fatal; every per-item failure is logged and counted.

use crate::analyzer::Analyzer;
use crate::models::{ListingItem, PersistedRecord, StoredAnalysis};
use crate::scrapers::{Extractor, ImageResolver, PageFetcher};
use crate::store::RecordStore;
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Persist records whose analysis degraded, so they are not retried
    pub persist_degraded: bool,
    pub resale_multiplier: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            persist_degraded: true,
            resale_multiplier: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub extracted: usize,
    pub skipped: usize,
    pub persisted: usize,
    /// Persisted with a pending/failed analysis
    pub degraded: usize,
    /// Degraded and left unwritten because `persist_degraded` is off
    pub not_persisted: usize,
    pub errored: usize,
}

/// Terminal state of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Skipped,
    Persisted { degraded: bool },
    NotPersisted,
}

/// Explicitly injected collaborators; the caller owns their lifecycle.
pub struct Pipeline<'a> {
    pub fetcher: &'a dyn PageFetcher,
    pub extractor: &'a Extractor,
    pub images: &'a ImageResolver,
    pub analyzer: &'a Analyzer,
    pub store: &'a dyn RecordStore,
    pub settings: PipelineSettings,
}

impl Pipeline<'_> {
    pub async fn run(&self) -> Result<RunSummary> {
        info!(strategy = self.fetcher.strategy_name(), "Starting scrape...");

        let html = self
            .fetcher
            .fetch_listing_page()
            .await
            .context("Failed to fetch listing page")?;

        let items = self.extractor.extract(&html);
        let mut summary = RunSummary {
            extracted: items.len(),
            ..RunSummary::default()
        };
        info!("Found {} bikes", items.len());

        for item in &items {
            match self.process_item(item).await {
                Ok(ItemOutcome::Skipped) => summary.skipped += 1,
                Ok(ItemOutcome::Persisted { degraded }) => {
                    summary.persisted += 1;
                    if degraded {
                        summary.degraded += 1;
                    }
                }
                Ok(ItemOutcome::NotPersisted) => summary.not_persisted += 1,
                Err(e) => {
                    warn!(id = %item.id, "Error processing bike: {e:#}");
                    summary.errored += 1;
                }
            }
        }

        info!(
            extracted = summary.extracted,
            skipped = summary.skipped,
            persisted = summary.persisted,
            degraded = summary.degraded,
            errored = summary.errored,
            "Scrape completed"
        );
        Ok(summary)
    }

    pub async fn process_item(&self, item: &ListingItem) -> Result<ItemOutcome> {
        // A failed check skips the item rather than risking a second paid analysis.
        let known = self
            .store
            .exists(&item.id)
            .await
            .context("Dedup check failed")?;
        if known {
            info!(id = %item.id, "Bike already processed");
            return Ok(ItemOutcome::Skipped);
        }

        let image = self.images.resolve(self.fetcher, item).await;
        let outcome = self.analyzer.analyze(item, &image).await;
        let degraded = outcome.is_degraded();

        if degraded && !self.settings.persist_degraded {
            info!(id = %item.id, "Analysis degraded, leaving unrecorded for a later run");
            return Ok(ItemOutcome::NotPersisted);
        }

        let analysis = StoredAnalysis::from_outcome(&outcome, image.is_present(), Utc::now());
        let record = PersistedRecord::new(
            item,
            image.url.clone(),
            analysis,
            self.settings.resale_multiplier,
            Utc::now(),
        );

        self.store
            .set(&item.id, &record)
            .await
            .context("Failed to persist record")?;

        info!(id = %item.id, recommendation = ?record.analysis.recommendation, "Saved bike: {}", item.title);
        Ok(ItemOutcome::Persisted { degraded })
    }
}
