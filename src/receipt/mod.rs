// Receipt extraction — structured data from receipt photos.

pub mod gemini;
pub mod traits;

use std::time::Duration;

use anyhow::{Context, Result};

/// Per-download timeout for receipt images.
const IMAGE_TIMEOUT: Duration = Duration::from_secs(20);

/// Download a receipt image by URL.
pub async fn fetch_image(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::Client::builder()
        .timeout(IMAGE_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Image download failed")?;

    if !response.status().is_success() {
        anyhow::bail!("Image download returned {}", response.status());
    }

    let bytes = response
        .bytes()
        .await
        .context("Failed to read image body")?;

    Ok(bytes.to_vec())
}
