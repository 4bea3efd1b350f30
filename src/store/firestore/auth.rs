//! Service-account access tokens for the Firestore REST API.

use crate::store::StoreError;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Fields we need from a Google service-account key file
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Auth(format!("invalid service account key: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Signed JWT assertion for the OAuth2 jwt-bearer grant
pub fn build_assertion(key: &ServiceAccountKey) -> Result<String, StoreError> {
    let now = Utc::now();
    let claims = Claims {
        iss: &key.client_email,
        scope: DATASTORE_SCOPE,
        aud: &key.token_uri,
        iat: now.timestamp(),
        exp: (now + Duration::minutes(60)).timestamp(),
    };

    let enc_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| StoreError::Auth(format!("private key is not RSA PEM: {e}")))?;

    encode(&Header::new(Algorithm::RS256), &claims, &enc_key)
        .map_err(|e| StoreError::Auth(format!("failed to sign assertion: {e}")))
}

/// Exchange a service-account key for a short-lived access token.
/// The token outlives a single run, so it is not refreshed.
pub async fn fetch_access_token(http: &reqwest::Client, key: &ServiceAccountKey) -> Result<String, StoreError> {
    let assertion = build_assertion(key)?;
    debug!(client_email = %key.client_email, "Requesting Firestore access token");

    let resp = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(StoreError::Auth(format!("token endpoint returned {status}: {message}")));
    }

    let token: TokenResponse = resp.json().await?;
    Ok(token.access_token)
}
