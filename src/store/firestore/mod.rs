//! Firestore-backed record store over the REST API.

pub mod auth;
pub mod value;

use super::{RecordStore, StoreError};
use crate::config::FirestoreAuth;
use crate::models::PersistedRecord;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const FIRESTORE_API_URL: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    fields: Map<String, Value>,
}

pub struct FirestoreStore {
    http: reqwest::Client,
    collection_url: Url,
    token: String,
}

impl FirestoreStore {
    /// Resolve credentials and build a store for `collection`.
    pub async fn connect(project_id: Option<&str>, collection: &str, credentials: &FirestoreAuth) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create Firestore HTTP client")?;

        let (token, key_project) = match credentials {
            FirestoreAuth::AccessToken(token) => (token.clone(), None),
            FirestoreAuth::ServiceAccount(raw) => {
                let key = auth::ServiceAccountKey::from_json(raw)?;
                let token = auth::fetch_access_token(&http, &key).await?;
                (token, key.project_id)
            }
        };

        let project_id = project_id
            .map(String::from)
            .or(key_project)
            .ok_or_else(|| anyhow!("FIRESTORE_PROJECT_ID is not set and the key carries no project_id"))?;

        info!(project_id = %project_id, collection, "Connected to Firestore");
        Self::with_token(http, FIRESTORE_API_URL, &project_id, collection, token)
    }

    /// Build against an explicit API root, e.g. the Firestore emulator.
    pub fn with_token(
        http: reqwest::Client,
        api_url: &str,
        project_id: &str,
        collection: &str,
        token: String,
    ) -> Result<Self> {
        let collection_url = Url::parse(&format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            api_url.trim_end_matches('/'),
            project_id,
            collection
        ))
        .context("Invalid Firestore collection URL")?;

        Ok(Self {
            http,
            collection_url,
            token,
        })
    }

    pub fn document_url(&self, key: &str) -> Result<Url, StoreError> {
        let mut url = self.collection_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable("collection URL cannot take a path".to_string()))?
            .push(key);
        Ok(url)
    }

    async fn fetch(&self, key: &str, mask: Option<&str>) -> Result<Option<Document>, StoreError> {
        let mut url = self.document_url(key)?;
        if let Some(field) = mask {
            url.query_pairs_mut().append_pair("mask.fieldPaths", field);
        }

        let resp = self.http.get(url).bearer_auth(&self.token).send().await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(resp.json().await?)),
            status => Err(api_error(status, resp).await),
        }
    }
}

async fn api_error(status: StatusCode, resp: reqwest::Response) -> StoreError {
    StoreError::Api {
        status: status.as_u16(),
        message: resp.text().await.unwrap_or_default(),
    }
}

/// Firestore document body for a record
pub fn encode_record(record: &PersistedRecord) -> Result<Value, StoreError> {
    let serialized = serde_json::to_value(record).map_err(|e| StoreError::Decode {
        key: record.id.clone(),
        message: e.to_string(),
    })?;
    let Value::Object(object) = serialized else {
        return Err(StoreError::Decode {
            key: record.id.clone(),
            message: "record did not serialize to an object".to_string(),
        });
    };
    Ok(json!({ "fields": value::to_fields(&object) }))
}

pub fn decode_record(key: &str, fields: &Map<String, Value>) -> Result<PersistedRecord, StoreError> {
    let decode_err = |message: String| StoreError::Decode {
        key: key.to_string(),
        message,
    };
    let object = value::from_fields(fields).map_err(decode_err)?;
    serde_json::from_value(object).map_err(|e| decode_err(e.to_string()))
}

#[async_trait]
impl RecordStore for FirestoreStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.fetch(key, Some("id")).await?.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<PersistedRecord>, StoreError> {
        match self.fetch(key, None).await? {
            Some(doc) => Ok(Some(decode_record(key, &doc.fields)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, record: &PersistedRecord) -> Result<(), StoreError> {
        let url = self.document_url(key)?;
        let body = encode_record(record)?;

        // PATCH without an update mask replaces the whole document, creating it if absent.
        let resp = self
            .http
            .patch(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(status, resp).await);
        }
        debug!(key, "Wrote Firestore document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AnalysisOutcome, AnalysisResult, ListingItem, StoredAnalysis, Verdict,
    };
    use chrono::Utc;

    fn store() -> FirestoreStore {
        FirestoreStore::with_token(
            reqwest::Client::new(),
            "http://localhost:8080/v1/",
            "bikes",
            "analyzed_bikes",
            "token".into(),
        )
        .unwrap()
    }

    #[test]
    fn document_url_targets_collection() {
        assert_eq!(
            store().document_url("123456").unwrap().as_str(),
            "http://localhost:8080/v1/projects/bikes/databases/(default)/documents/analyzed_bikes/123456"
        );
    }

    #[test]
    fn document_url_escapes_keys() {
        let url = store().document_url("a b/c").unwrap();
        assert!(url.as_str().ends_with("/analyzed_bikes/a%20b%2Fc"));
    }

    #[test]
    fn record_survives_firestore_encoding() {
        let item = ListingItem {
            id: "123456".into(),
            title: "Kellys Spider".into(),
            price: Some(130),
            link: "https://sport.bazos.sk/inzerat/123456/kellys.php".into(),
            image_url: Some("https://www.bazos.sk/img/1/123456.jpg".into()),
            description: None,
        };
        let outcome = AnalysisOutcome::Completed(AnalysisResult {
            recommendation: Verdict::Maybe,
            rationale: "Fair price".into(),
            score: Some(6.0),
            estimated_profit_potential: Some("40 €".into()),
            condition: None,
        });
        let record = PersistedRecord::new(
            &item,
            None,
            StoredAnalysis::from_outcome(&outcome, true, Utc::now()),
            1.5,
            Utc::now(),
        );

        let body = encode_record(&record).unwrap();
        assert_eq!(body["fields"]["price"], json!({ "integerValue": "130" }));

        let fields = body["fields"].as_object().unwrap();
        assert_eq!(decode_record("123456", fields).unwrap(), record);
    }
}
