// JSON handlers for the trigger API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::monitor::{self, RunMode};
use crate::receipt::gemini::GeminiExtractor;
use crate::receipt::traits::{Receipt, ReceiptExtractor};
use crate::web::AppState;

#[derive(Deserialize)]
pub struct ScrapeRequest {
    pub post_id: String,
    pub spreadsheet_id: String,
    pub worksheet_name: String,
}

#[derive(Serialize)]
pub struct ScrapeResponse {
    pub response: String,
}

/// POST /api/scrape — sweep a post once and upload its receipt comments.
///
/// Blocks until the sweep finishes; the response carries the terminal
/// status string ("Success" on a clean run).
pub async fn scrape(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> impl IntoResponse {
    if let Err(e) = state.config.require_graph() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    match monitor::run_pipeline(
        &state.config,
        &request.post_id,
        &request.spreadsheet_id,
        &request.worksheet_name,
        RunMode::OneClick,
    )
    .await
    {
        Ok(status) => Json(ScrapeResponse { response: status }).into_response(),
        Err(e) => {
            error!(error = %e, post_id = %request.post_id, "Scrape request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("{e:#}") })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct OcrRequest {
    pub image_url: String,
}

#[derive(Serialize)]
pub struct OcrResponse {
    pub structured_text: Receipt,
}

/// POST /api/ocr — download a receipt image and extract its fields.
///
/// A failed extraction responds with the neutral all-"None" record rather
/// than an error, so batch callers can tell "unreadable ticket" apart from
/// "service broken".
pub async fn ocr(
    State(state): State<AppState>,
    Json(request): Json<OcrRequest>,
) -> impl IntoResponse {
    if request.image_url.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "No image_url provided" })),
        )
            .into_response();
    }

    if let Err(e) = state.config.require_gemini() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    let image = match crate::receipt::fetch_image(&request.image_url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": format!("{e:#}") })),
            )
                .into_response();
        }
    };

    let extractor =
        GeminiExtractor::new(&state.config.gemini_api_key, &state.config.gemini_model);

    let receipt = match extractor.extract(&image).await {
        Ok(receipt) => receipt,
        Err(e) => {
            error!(error = %e, "Receipt extraction failed, returning neutral record");
            Receipt::unreadable()
        }
    };

    Json(OcrResponse {
        structured_text: receipt,
    })
    .into_response()
}

/// GET /api/health — liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
