pub mod ai;
pub mod analyzer;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod scrapers;
pub mod store;

pub use config::Config;
pub use pipeline::{Pipeline, PipelineSettings, RunSummary};
