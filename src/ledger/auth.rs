// Google service-account authentication.
//
// The standard two-legged OAuth flow: sign a short-lived JWT with the
// service account's RSA key, exchange it at the token endpoint for a
// bearer token, cache the token until shortly before expiry. Callers ask
// for `token()` before every request — a refresh happens transparently
// when the cached one has expired, which is what keeps long monitor runs
// alive across token expiry.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// OAuth scope for reading and writing spreadsheet values.
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Default token endpoint (the key file may override it).
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Signed assertions are valid for an hour (the maximum Google allows).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh the cached token this long before it actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The fields we need from a service-account key file.
#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Token provider backed by a service-account key file.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Load the key file and prepare the signing key.
    ///
    /// No network traffic happens here — the first token is fetched lazily
    /// on the first `token()` call.
    pub fn load(key_file: impl AsRef<Path>) -> Result<Self> {
        let path = key_file.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account key: {}", path.display()))?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid service account key file: {}", path.display()))?;

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Service account private_key is not a valid RSA PEM key")?;

        Ok(Self {
            key,
            encoding_key,
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        })
    }

    /// Drop the cached token so the next `token()` call fetches a fresh
    /// one. Used when the server rejects a token the cache still considers
    /// valid (revocation, clock skew).
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Return a valid bearer token, refreshing it if needed.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(ref entry) = *cached {
            if entry.expires_at.saturating_duration_since(Instant::now()) > EXPIRY_MARGIN {
                return Ok(entry.token.clone());
            }
            debug!("Cached Sheets token expired, refreshing");
        }

        let entry = self.fetch_token().await?;
        let token = entry.token.clone();
        *cached = Some(entry);
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let token_uri = self
            .key
            .token_uri
            .as_deref()
            .unwrap_or(DEFAULT_TOKEN_URI);

        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let assertion = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )
        .context("Failed to sign service account assertion")?;

        let response = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &assertion),
            ])
            .send()
            .await
            .context("Token exchange request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Token endpoint returned {status}: {body}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        info!(
            account = %self.key.client_email,
            expires_in = token.expires_in,
            "Obtained Sheets access token"
        );

        Ok(CachedToken {
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}
