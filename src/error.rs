use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("request body is not valid JSON")]
    InvalidJson,

    #[error("request is missing the \"text\" field")]
    MissingText,

    #[error("model error: {0}")]
    Model(String),

    #[error("unexpected output tensor rank {0}")]
    BadTensorRank(usize),

    #[error("WAV encoding failed: {0}")]
    Encode(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("model config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Clients only ever see one of three fixed plain-text bodies; the
        // underlying cause stays in the logs.
        let body = match &self {
            AppError::InvalidJson => "Invalid JSON data",
            AppError::MissingText => "Missing \"text\" parameter",
            _ => {
                tracing::error!("synthesis failed: {}", self);
                "Invalid model response"
            }
        };

        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, String) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn invalid_json_body() {
        let (status, body) = body_of(AppError::InvalidJson).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid JSON data");
    }

    #[tokio::test]
    async fn missing_text_body() {
        let (status, body) = body_of(AppError::MissingText).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Missing \"text\" parameter");
    }

    #[tokio::test]
    async fn synthesis_failures_share_one_body() {
        for err in [
            AppError::Model("boom".into()),
            AppError::BadTensorRank(3),
            AppError::Io(std::io::Error::other("disk")),
        ] {
            let (status, body) = body_of(err).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, "Invalid model response");
        }
    }
}
