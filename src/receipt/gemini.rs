// Gemini implementation of receipt extraction.
//
// One `generateContent` call per image: the photo goes inline (base64) next
// to a short instruction, and a response JSON schema constrains the output
// to the Receipt shape, so the reply body parses directly — no prose
// stripping.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::traits::{Receipt, ReceiptExtractor};

/// Default Gemini API host.
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

const PROMPT: &str = "Extract the fields from this fuel station receipt. The station \
code is the number printed after the word ESTACION; do not use the code after \
ES ORIGEN, which identifies the origin station instead.";

/// Gemini-backed receipt extractor.
pub struct GeminiExtractor {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiExtractor {
    /// Create an extractor for the given API key and model id.
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_GEMINI_API_URL.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// The JSON schema the model's response must conform to.
    fn response_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "total": { "type": "number", "description": "Total amount paid in MXN" },
                "quantity": { "type": "number", "description": "Fuel volume in liters" },
                "date": { "type": "string", "description": "Purchase date as printed" },
                "product": { "type": "string", "description": "Fuel product name" },
                "station": { "type": "integer", "description": "Numeric station code after ESTACION" },
                "address": { "type": "string", "description": "Station street address" }
            },
            "required": ["total", "quantity", "date", "product", "station", "address"]
        })
    }
}

#[async_trait]
impl ReceiptExtractor for GeminiExtractor {
    async fn extract(&self, image: &[u8]) -> Result<Receipt> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        let request = json!({
            "contents": [{
                "parts": [
                    { "text": PROMPT },
                    { "inline_data": { "mime_type": "image/jpeg", "data": encoded } }
                ]
            }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "response_schema": Self::response_schema()
            }
        });

        debug!(model = %self.model, image_bytes = image.len(), "Requesting receipt extraction");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context("Failed to call Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API returned {status}: {body}");
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text = result
            .first_text()
            .ok_or_else(|| anyhow::anyhow!("Gemini response contained no candidate text"))?;

        let receipt: Receipt = serde_json::from_str(text)
            .context("Gemini response text did not match the receipt schema")?;

        Ok(receipt)
    }
}

// --- Gemini API response types ---

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// The first candidate's first text part, when present.
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .parts
            .iter()
            .find_map(|part| part.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_candidate_text() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{
                        "text": "{\"total\": 850.0, \"quantity\": 35.2, \"date\": \"2026-08-01\", \"product\": \"Magna\", \"station\": 4821, \"address\": \"Av. Siempre Viva 123\"}"
                    }]
                }
            }]
        }"#;

        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let receipt: Receipt = serde_json::from_str(resp.first_text().unwrap()).unwrap();

        assert_eq!(receipt.total, 850.0);
        assert_eq!(receipt.station, 4821);
        assert_eq!(receipt.product, "Magna");
    }

    #[test]
    fn empty_candidates_yield_no_text() {
        let resp: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(resp.first_text().is_none());
    }

    #[test]
    fn missing_candidates_field_yields_no_text() {
        let resp: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.first_text().is_none());
    }

    #[test]
    fn skips_non_text_parts() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": null}, {"text": "{}"}]
                }
            }]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_text(), Some("{}"));
    }

    #[test]
    fn response_schema_lists_all_fields() {
        let schema = GeminiExtractor::response_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 6);
        for field in ["total", "quantity", "date", "product", "station", "address"] {
            assert!(schema["properties"].get(field).is_some(), "missing {field}");
        }
    }
}
