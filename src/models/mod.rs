use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single bicycle advertisement pulled off the listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingItem {
    /// Stable key derived from the detail-page path
    pub id: String,
    pub title: String,
    pub price: Option<i64>,
    pub link: String,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// Advisory label returned by a successful valuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Buy,
    Maybe,
    Skip,
}

/// Recommendation as it is recorded, including the sentinels for degraded runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Buy,
    Maybe,
    Skip,
    Pending,
    Failed,
}

impl From<Verdict> for Recommendation {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Buy => Recommendation::Buy,
            Verdict::Maybe => Recommendation::Maybe,
            Verdict::Skip => Recommendation::Skip,
        }
    }
}

/// Structured valuation produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub recommendation: Verdict,
    pub rationale: String,
    pub score: Option<f64>,
    pub estimated_profit_potential: Option<String>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradedStatus {
    /// The model answered but gave no usable recommendation
    Pending,
    /// The call errored or the answer could not be parsed
    Failed,
}

/// Stand-in for a valuation that could not be obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedAnalysis {
    pub status: DegradedStatus,
    pub reason: String,
    pub raw_response: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(AnalysisResult),
    Degraded(DegradedAnalysis),
}

impl AnalysisOutcome {
    pub fn failed(reason: impl Into<String>, raw_response: Option<String>) -> Self {
        AnalysisOutcome::Degraded(DegradedAnalysis {
            status: DegradedStatus::Failed,
            reason: reason.into(),
            raw_response,
        })
    }

    pub fn pending(reason: impl Into<String>, raw_response: Option<String>) -> Self {
        AnalysisOutcome::Degraded(DegradedAnalysis {
            status: DegradedStatus::Pending,
            reason: reason.into(),
            raw_response,
        })
    }

    pub fn recommendation(&self) -> Recommendation {
        match self {
            AnalysisOutcome::Completed(result) => result.recommendation.into(),
            AnalysisOutcome::Degraded(d) => match d.status {
                DegradedStatus::Pending => Recommendation::Pending,
                DegradedStatus::Failed => Recommendation::Failed,
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, AnalysisOutcome::Degraded(_))
    }
}

/// Analysis as it is stored alongside a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub recommendation: Recommendation,
    pub rationale: Option<String>,
    pub score: Option<f64>,
    pub estimated_profit_potential: Option<String>,
    pub condition: Option<String>,
    pub error: Option<String>,
    pub multimodal: bool,
    pub analyzed_at: DateTime<Utc>,
}

impl StoredAnalysis {
    pub fn from_outcome(outcome: &AnalysisOutcome, multimodal: bool, analyzed_at: DateTime<Utc>) -> Self {
        match outcome {
            AnalysisOutcome::Completed(result) => Self {
                recommendation: result.recommendation.into(),
                rationale: Some(result.rationale.clone()),
                score: result.score,
                estimated_profit_potential: result.estimated_profit_potential.clone(),
                condition: result.condition.clone(),
                error: None,
                multimodal,
                analyzed_at,
            },
            AnalysisOutcome::Degraded(d) => Self {
                recommendation: outcome.recommendation(),
                rationale: d.raw_response.clone(),
                score: None,
                estimated_profit_potential: None,
                condition: None,
                error: Some(d.reason.clone()),
                multimodal,
                analyzed_at,
            },
        }
    }
}

/// Placeholder resale figures derived from the asking price
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Financials {
    pub buy_price: Option<i64>,
    pub sell_price: Option<i64>,
    pub profit: Option<i64>,
    /// Percent, rounded to two decimals
    pub roi: Option<f64>,
}

impl Financials {
    /// Fixed-multiple resale estimate. Not a market model.
    pub fn estimate(price: Option<i64>, resale_multiplier: f64) -> Self {
        let buy = match price {
            Some(p) if p > 0 => p,
            _ => return Self::default(),
        };

        let sell = (buy as f64 * resale_multiplier).round() as i64;
        let profit = sell - buy;
        let roi = (profit as f64 / buy as f64 * 100.0 * 100.0).round() / 100.0;

        Self {
            buy_price: Some(buy),
            sell_price: Some(sell),
            profit: Some(profit),
            roi: Some(roi),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Completed,
    Degraded,
}

/// Durable record keyed by the listing identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    pub id: String,
    pub title: String,
    pub link: String,
    pub price: Option<i64>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub analysis: StoredAnalysis,
    pub financials: Financials,
    pub scraped_at: DateTime<Utc>,
    pub status: RecordStatus,
}

impl PersistedRecord {
    pub fn new(
        item: &ListingItem,
        image_url: Option<String>,
        analysis: StoredAnalysis,
        resale_multiplier: f64,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        let status = match analysis.recommendation {
            Recommendation::Pending | Recommendation::Failed => RecordStatus::Degraded,
            _ => RecordStatus::Completed,
        };

        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            link: item.link.clone(),
            price: item.price,
            image_url: image_url.or_else(|| item.image_url.clone()),
            description: item.description.clone(),
            financials: Financials::estimate(item.price, resale_multiplier),
            analysis,
            scraped_at,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn financials_follow_fixed_multiple() {
        let f = Financials::estimate(Some(120), 1.5);
        assert_eq!(f.buy_price, Some(120));
        assert_eq!(f.sell_price, Some(180));
        assert_eq!(f.profit, Some(60));
        assert_eq!(f.roi, Some(50.0));
    }

    #[test]
    fn financials_absent_without_price() {
        assert_eq!(Financials::estimate(None, 1.5), Financials::default());
        assert_eq!(Financials::estimate(Some(0), 1.5), Financials::default());
    }

    #[test]
    fn degraded_outcome_maps_to_sentinel() {
        let failed = AnalysisOutcome::failed("boom", None);
        assert_eq!(failed.recommendation(), Recommendation::Failed);
        assert!(failed.is_degraded());

        let pending = AnalysisOutcome::pending("no verdict", Some("hmm".into()));
        assert_eq!(pending.recommendation(), Recommendation::Pending);
    }

    #[test]
    fn record_status_tracks_analysis() {
        let item = ListingItem {
            id: "123".into(),
            title: "Kellys".into(),
            price: Some(100),
            link: "https://sport.bazos.sk/inzerat/123/kellys.php".into(),
            image_url: None,
            description: None,
        };
        let analysis = StoredAnalysis::from_outcome(&AnalysisOutcome::failed("timeout", None), false, Utc::now());
        let record = PersistedRecord::new(&item, None, analysis, 1.5, Utc::now());

        assert_eq!(record.status, RecordStatus::Degraded);
        assert_eq!(record.analysis.error.as_deref(), Some("timeout"));
        assert_eq!(record.financials.sell_price, Some(150));
    }

    #[test]
    fn record_serializes_camel_case() {
        let item = ListingItem {
            id: "9".into(),
            title: "Author".into(),
            price: None,
            link: "https://sport.bazos.sk/inzerat/9/a.php".into(),
            image_url: Some("https://img/9.jpg".into()),
            description: None,
        };
        let result = AnalysisOutcome::Completed(AnalysisResult {
            recommendation: Verdict::Buy,
            rationale: "cheap".into(),
            score: Some(8.0),
            estimated_profit_potential: None,
            condition: None,
        });
        let record = PersistedRecord::new(&item, None, StoredAnalysis::from_outcome(&result, true, Utc::now()), 1.5, Utc::now());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["imageUrl"], "https://img/9.jpg");
        assert_eq!(json["analysis"]["recommendation"], "buy");
        assert_eq!(json["status"], "completed");
        assert!(json.get("scrapedAt").is_some());
    }
}
