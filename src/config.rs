use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy. Defaults are
/// enumerated here, once — inner components take plain values and
/// never read the environment themselves.
pub struct Config {
    /// Facebook page id — combined with the target post id to form the
    /// full Graph API object id (`<page>_<post>`).
    pub page_id: String,
    /// Default post to monitor when the CLI doesn't override it.
    pub target_post_id: String,
    /// Long-lived Graph API access token.
    pub graph_api_token: String,
    /// Graph API version segment (defaults to v22.0).
    pub graph_api_version: String,
    /// Seconds between polling cycles in continuous mode.
    pub interval: u64,
    /// Row-count threshold that triggers a batch upload.
    pub batch_size: usize,
    /// Seconds since the last successful upload that trigger a flush.
    pub upload_interval: u64,
    /// Comments requested per Graph API page.
    pub page_size: u32,
    /// Directory for the local CSV archive and post snapshots.
    pub data_dir: String,
    /// Path to the Google service-account key file (JSON).
    pub service_account_file: String,
    /// Target spreadsheet id (the token in the sheet's URL, not its title).
    pub spreadsheet_id: String,
    /// Worksheet title inside the spreadsheet.
    pub worksheet_name: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Only the Graph credentials have no default — everything else
    /// falls back to values that work for a single-post deployment.
    pub fn load() -> Result<Self> {
        Ok(Self {
            page_id: env::var("PAGE_ID").unwrap_or_default(),
            target_post_id: env::var("TARGET_POST_ID").unwrap_or_default(),
            graph_api_token: env::var("GRAPH_API_TOKEN").unwrap_or_default(),
            graph_api_version: env::var("GRAPH_API_VERSION")
                .unwrap_or_else(|_| "v22.0".to_string()),
            interval: env_parse("MAGPIE_INTERVAL", 60)?,
            batch_size: env_parse("MAGPIE_BATCH_SIZE", 7)?,
            upload_interval: env_parse("MAGPIE_UPLOAD_INTERVAL", 300)?,
            page_size: env_parse("MAGPIE_PAGE_SIZE", 100)?,
            data_dir: env::var("MAGPIE_DATA_DIR").unwrap_or_else(|_| "./magpie_data".to_string()),
            service_account_file: env::var("GOOGLE_SERVICE_ACCOUNT_FILE")
                .unwrap_or_else(|_| "credentials.json".to_string()),
            spreadsheet_id: env::var("SPREADSHEET_ID").unwrap_or_default(),
            worksheet_name: env::var("WORKSHEET_NAME").unwrap_or_else(|_| "Comments".to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
        })
    }

    /// The full Graph API object id for the configured post.
    pub fn post_id(&self) -> String {
        format!("{}_{}", self.page_id, self.target_post_id)
    }

    /// Check that the Graph API credentials are configured.
    /// Call this before any operation that talks to Facebook.
    pub fn require_graph(&self) -> Result<()> {
        if self.page_id.is_empty() || self.graph_api_token.is_empty() {
            anyhow::bail!(
                "PAGE_ID or GRAPH_API_TOKEN not set. Add them to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that a target spreadsheet is configured.
    pub fn require_sheets(&self) -> Result<()> {
        if self.spreadsheet_id.is_empty() {
            anyhow::bail!(
                "SPREADSHEET_ID not set. Add it to your .env file or pass --spreadsheet.\n\
                 Use the id from the sheet's URL, not its title."
            );
        }
        Ok(())
    }

    /// Check that the Gemini API key is configured.
    /// Call this before any receipt extraction.
    pub fn require_gemini(&self) -> Result<()> {
        if self.gemini_api_key.is_empty() {
            anyhow::bail!(
                "GEMINI_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }
}

/// Parse a numeric env var, falling back to a default when unset.
/// An unparseable value is an error, not a silent fallback.
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}
