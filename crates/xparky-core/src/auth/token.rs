use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::ServiceAccountKey;
use crate::api::ApiError;

/// Read-only Drive and Sheets scopes
pub const READONLY_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/spreadsheets.readonly",
];

/// Lifetime requested for the signed assertion (Google's maximum)
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: String, expires_in_secs: i64) -> Self {
        Self {
            token,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    /// Check if the token will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_minutes().max(0)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

enum TokenSource {
    ServiceAccount(ServiceAccountKey),
    Static(String),
}

/// Supplies bearer tokens for Google API requests.
pub struct TokenProvider {
    source: TokenSource,
    client: Client,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn service_account(key: ServiceAccountKey, client: Client) -> Self {
        Self {
            source: TokenSource::ServiceAccount(key),
            client,
            cached: Mutex::new(None),
        }
    }

    /// A fixed token, for tests and authenticating proxies
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            client: Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Return a valid access token, minting a new one when the cached token
    /// is missing or close to expiry.
    pub async fn token(&self) -> Result<String> {
        let key = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(key) => key,
        };

        let mut cached = self.cached.lock().await;
        if let Some(ref token) = *cached {
            if !token.needs_refresh() {
                return Ok(token.token.clone());
            }
            debug!(minutes_left = token.minutes_until_expiry(), "Refreshing access token");
        }

        let fresh = self.mint(key).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    /// Drop the cached token so the next request mints a new one
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn mint(&self, key: &ServiceAccountKey) -> Result<AccessToken> {
        let assertion = build_assertion(key, Utc::now())?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("Failed to send token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body).into());
        }

        let parsed: TokenResponse = response.json().await.context("Failed to parse token response")?;
        debug!(client_email = %key.client_email, expires_in = parsed.expires_in, "Minted access token");
        Ok(AccessToken::new(parsed.access_token, parsed.expires_in))
    }
}

/// Sign the RS256 JWT assertion for the bearer grant.
pub(crate) fn build_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String> {
    let iat = now.timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: READONLY_SCOPES.join(" "),
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .context("Service account private key is not a valid RSA PEM")?;

    encode(&header, &claims, &encoding_key).context("Failed to sign service account assertion")
}
