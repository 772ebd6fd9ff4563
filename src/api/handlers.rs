use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::error::Category;
use std::sync::Arc;

use super::{HealthResponse, SynthesisRequest};
use crate::api::routes::AppState;
use crate::error::AppError;

pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    // The body is taken raw rather than through the Json extractor so that a
    // syntax error and a missing field produce their distinct replies.
    let request: SynthesisRequest =
        serde_json::from_slice(&body).map_err(|e| match e.classify() {
            Category::Data => AppError::MissingText,
            _ => AppError::InvalidJson,
        })?;

    // Strip line breaks only; text that ends up empty still goes to the model.
    let text = request.text.replace(['\n', '\r'], "");

    // Inference is CPU-bound and can run for a long time; keep it off the
    // async runtime so concurrent requests are not starved.
    let tts = Arc::clone(&state.tts);
    let wav = tokio::task::spawn_blocking(move || tts.synthesize(&text))
        .await
        .map_err(|e| AppError::Model(format!("synthesis task failed: {e}")))??;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
