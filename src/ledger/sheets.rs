// Google Sheets ledger — values API reads and appends.
//
// Only two endpoints are used: `values/{range}` GET for the id column and
// `values/{range}:append` POST for row batches. The spreadsheet is
// addressed by id (the token in its URL); the worksheet by title. The
// header row is written once, on connect, if the sheet is empty.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::auth::ServiceAccountAuth;
use super::{CommentRow, Ledger, ROW_HEADERS};
use crate::retry;

/// Default Sheets API host.
pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com";

/// Retry budget for the append call (per the flush contract, exhaustion
/// surfaces as a flush failure and the batch is retained).
const APPEND_ATTEMPTS: u32 = 3;

/// Response from a `values/{range}` GET.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Ledger implementation backed by a Google Sheets worksheet.
pub struct SheetsLedger {
    client: reqwest::Client,
    auth: ServiceAccountAuth,
    base_url: String,
    spreadsheet_id: String,
    worksheet: String,
}

impl SheetsLedger {
    /// Connect to the worksheet and make sure the header row exists.
    pub async fn connect(
        key_file: &str,
        spreadsheet_id: &str,
        worksheet: &str,
    ) -> Result<Self> {
        let ledger = Self {
            client: reqwest::Client::new(),
            auth: ServiceAccountAuth::load(key_file)?,
            base_url: DEFAULT_SHEETS_API_URL.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            worksheet: worksheet.to_string(),
        };

        ledger.ensure_header().await?;

        info!(
            spreadsheet = spreadsheet_id,
            worksheet = worksheet,
            "Connected to Sheets ledger"
        );

        Ok(ledger)
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        // The worksheet title is quoted so spaces survive; the range itself
        // only ever contains A1-style column letters from this module.
        format!(
            "{}/v4/spreadsheets/{}/values/'{}'!{}{}",
            self.base_url, self.spreadsheet_id, self.worksheet, range, suffix
        )
    }

    async fn read_range(&self, range: &str) -> Result<ValueRange> {
        let token = self.auth.token().await?;
        let url = self.values_url(range, "");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .context("Sheets read request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Sheets read of {range} returned {status}: {body}");
        }

        response
            .json::<ValueRange>()
            .await
            .context("Failed to parse Sheets values response")
    }

    async fn append_values(&self, values: &serde_json::Value) -> Result<()> {
        // The token is re-acquired per attempt: if the previous attempt
        // failed on an expired session, the refresh happens here before
        // the retry fires.
        let token = self.auth.token().await?;
        let url = self.values_url("A:G", ":append?valueInputOption=RAW");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({ "values": values }))
            .send()
            .await
            .context("Sheets append request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                // Session expired under us; the next retry attempt will
                // fetch a fresh token.
                warn!("Sheets session expired, refreshing before retry");
                self.auth.invalidate().await;
            }
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Sheets append returned {status}: {body}");
        }

        Ok(())
    }

    /// Write the header row if the worksheet is empty.
    async fn ensure_header(&self) -> Result<()> {
        let head = self.read_range("A1:G1").await?;
        if !head.values.is_empty() {
            return Ok(());
        }

        let headers: Vec<String> = ROW_HEADERS.iter().map(|h| h.to_string()).collect();
        self.append_values(&json!([headers])).await?;
        info!("Wrote header row to empty worksheet");
        Ok(())
    }
}

#[async_trait]
impl Ledger for SheetsLedger {
    /// Read the comment-id column (everything below the header).
    async fn existing_comment_ids(&self) -> Result<HashSet<String>> {
        let range = self.read_range("A2:A").await?;

        let ids: HashSet<String> = range
            .values
            .into_iter()
            .filter_map(|mut row| {
                if row.is_empty() {
                    None
                } else {
                    Some(row.swap_remove(0))
                }
            })
            .filter(|id| !id.is_empty())
            .collect();

        debug!(count = ids.len(), "Read existing comment ids from ledger");
        Ok(ids)
    }

    async fn append_rows(&self, rows: &[CommentRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let values: Vec<Vec<String>> = rows.iter().map(|row| row.values()).collect();
        let payload = serde_json::to_value(values)?;

        retry::with_backoff("Sheets append", APPEND_ATTEMPTS, || {
            self.append_values(&payload)
        })
        .await?;

        debug!(rows = rows.len(), "Appended rows to ledger");
        Ok(())
    }
}
