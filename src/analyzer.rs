//! Bike valuation through the generative model.
//!
//! One attempt per listing. Every failure mode ends in a well-formed
//! `AnalysisOutcome::Degraded`; nothing here returns an error.

use crate::ai::{ImageInput, ModelRequest, VisionModel};
use crate::config::ResponseMode;
use crate::models::{AnalysisOutcome, AnalysisResult, ListingItem, Verdict};
use crate::scrapers::ResolvedImage;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are \"Bike Flip Analyzer\", a specialist in buying used bicycles \
on the Slovak classifieds market and reselling them at a profit. Judge the asking price against \
typical second-hand prices for the brand, model and visible condition, factor in likely repair \
costs, and give a short, practical recommendation.";

const JSON_INSTRUCTIONS: &str = "Reply with a single JSON object and nothing else, using exactly \
these fields: {\"recommendation\": \"buy\" | \"maybe\" | \"skip\", \"rationale\": string, \
\"score\": number from 0 to 10, \"estimated_profit_potential\": string, \"condition\": string}.";

const TEXT_INSTRUCTIONS: &str = "Start your answer with exactly one of BUY, MAYBE or SKIP, \
then explain briefly.";

const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Copy)]
pub struct AnalyzerSettings {
    pub max_tokens: u32,
    pub response_mode: ResponseMode,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            max_tokens: 300,
            response_mode: ResponseMode::Json,
        }
    }
}

pub struct Analyzer {
    model: Arc<dyn VisionModel>,
    settings: AnalyzerSettings,
}

impl Analyzer {
    pub fn new(model: Arc<dyn VisionModel>, settings: AnalyzerSettings) -> Self {
        Self { model, settings }
    }

    /// Multimodal when an image was resolved, text-only otherwise.
    pub async fn analyze(&self, item: &ListingItem, image: &ResolvedImage) -> AnalysisOutcome {
        let request = self.build_request(item, image);
        debug!(id = %item.id, multimodal = request.is_multimodal(), "Requesting valuation");

        let reply = match self.model.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(id = %item.id, "Analysis failed: {e}");
                return AnalysisOutcome::failed(e.to_string(), None);
            }
        };

        let outcome = match self.settings.response_mode {
            ResponseMode::Json => parse_json_reply(&reply),
            ResponseMode::Text => classify_text_reply(&reply),
        };

        if let AnalysisOutcome::Degraded(ref d) = outcome {
            warn!(id = %item.id, status = ?d.status, "Unusable model reply: {}", d.reason);
        }
        outcome
    }

    pub fn build_request(&self, item: &ListingItem, image: &ResolvedImage) -> ModelRequest {
        let instructions = match self.settings.response_mode {
            ResponseMode::Json => JSON_INSTRUCTIONS,
            ResponseMode::Text => TEXT_INSTRUCTIONS,
        };

        let image = match (&image.inline, &image.url) {
            (Some(inline), _) => Some(ImageInput::Inline {
                media_type: inline.media_type.clone(),
                data: inline.data.clone(),
            }),
            (None, Some(url)) => Some(ImageInput::Url(url.clone())),
            (None, None) => None,
        };

        ModelRequest {
            system: format!("{SYSTEM_PROMPT}\n\n{instructions}"),
            text: describe(item, image.is_some()),
            image,
            max_tokens: self.settings.max_tokens,
            json_response: self.settings.response_mode == ResponseMode::Json,
        }
    }
}

fn describe(item: &ListingItem, has_image: bool) -> String {
    let mut text = format!("Title: {}\n", item.title);
    match item.price {
        Some(price) => text.push_str(&format!("Asking price: {price} €\n")),
        None => text.push_str("Asking price: not stated\n"),
    }
    if let Some(description) = &item.description {
        text.push_str(&format!("Description: {description}\n"));
    }
    text.push_str(&format!("Listing: {}\n", item.link));
    if !has_image {
        text.push_str("No photo is available; judge from the text alone.\n");
    }
    text
}

/// Lenient view of the model's JSON
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    recommendation: Option<String>,
    #[serde(alias = "reason", alias = "reasoning")]
    rationale: Option<String>,
    score: Option<Value>,
    #[serde(alias = "estimatedProfitPotential", alias = "profit_potential")]
    estimated_profit_potential: Option<Value>,
    condition: Option<String>,
}

/// Parse a JSON reply, tolerating code fences and surrounding prose.
pub fn parse_json_reply(reply: &str) -> AnalysisOutcome {
    let Some(body) = json_object_slice(reply) else {
        return AnalysisOutcome::failed("Reply contained no JSON object", Some(reply.to_string()));
    };

    let raw: RawAnalysis = match serde_json::from_str(body) {
        Ok(raw) => raw,
        Err(e) => {
            return AnalysisOutcome::failed(format!("Failed to parse reply: {e}"), Some(reply.to_string()));
        }
    };

    let Some(verdict) = raw.recommendation.as_deref().and_then(parse_verdict) else {
        return AnalysisOutcome::failed(
            format!("Unknown recommendation {:?}", raw.recommendation),
            Some(reply.to_string()),
        );
    };

    AnalysisOutcome::Completed(AnalysisResult {
        recommendation: verdict,
        rationale: raw.rationale.unwrap_or_default(),
        score: raw
            .score
            .as_ref()
            .and_then(number)
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, MAX_SCORE)),
        estimated_profit_potential: raw.estimated_profit_potential.as_ref().and_then(text_value),
        condition: raw.condition.filter(|c| !c.trim().is_empty()),
    })
}

/// Plain-text reply: the leading keyword is the recommendation, the rest is kept verbatim.
pub fn classify_text_reply(reply: &str) -> AnalysisOutcome {
    let trimmed = reply.trim();
    let first_word = trimmed
        .split(|c: char| c.is_whitespace() || c == ':' || c == '.' || c == ',' || c == '-')
        .find(|w| !w.is_empty())
        .unwrap_or("");

    match parse_verdict(first_word) {
        Some(verdict) => AnalysisOutcome::Completed(AnalysisResult {
            recommendation: verdict,
            rationale: trimmed.to_string(),
            score: None,
            estimated_profit_potential: None,
            condition: None,
        }),
        None => AnalysisOutcome::pending("Reply did not start with a recommendation", Some(trimmed.to_string())),
    }
}

fn parse_verdict(raw: &str) -> Option<Verdict> {
    match raw.trim().trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase().as_str() {
        "buy" | "kúpiť" | "kupit" => Some(Verdict::Buy),
        "maybe" | "možno" | "mozno" => Some(Verdict::Maybe),
        "skip" | "pass" | "preskočiť" | "preskocit" => Some(Verdict::Skip),
        _ => None,
    }
}

fn json_object_slice(reply: &str) -> Option<&str> {
    let stripped = strip_code_blocks(reply);
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    (start < end).then(|| &stripped[start..=end])
}

/// Strip markdown code blocks from a response.
fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
