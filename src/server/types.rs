use crate::{
    Error,
    qa::Question,
    shell::{QaExchange, ShellView},
};
use axum::{Json, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub view: ShellView,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub session_id: String,
    pub question: Question,
    pub answer: String,
    pub score: f32,
    pub found: bool,
}

impl AnswerResponse {
    pub fn new(session_id: String, exchange: QaExchange) -> Self {
        let found = !exchange.answer.is_empty();
        Self {
            session_id,
            question: exchange.question,
            answer: exchange.answer.text,
            score: exchange.answer.score,
            found,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::SessionNotFound { .. } | Error::QuestionNotFound { .. } => StatusCode::NOT_FOUND,
        Error::InvalidTransition { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for ErrorResponse {
    fn from(error: Error) -> Self {
        Self {
            kind: error.kind(),
            error: error.to_string(),
        }
    }
}

pub fn api_error(error: Error) -> ApiError {
    (status_for(&error), Json(error.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_per_error_class() {
        let cases = [
            (Error::decode("bad bytes"), StatusCode::UNPROCESSABLE_ENTITY),
            (
                Error::UnsupportedMediaType("image/gif".to_string()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                Error::UploadTooLarge { limit_bytes: 1024 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                Error::model_unavailable("deepset/roberta-base-squad2", "offline"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (Error::inference("nan"), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Timeout { seconds: 120 }, StatusCode::GATEWAY_TIMEOUT),
            (Error::QuestionNotFound { index: 9 }, StatusCode::NOT_FOUND),
            (Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(status_for(&error), status, "{error}");
        }
    }

    #[test]
    fn test_error_response_carries_kind() {
        let response = ErrorResponse::from(Error::UploadTooLarge { limit_bytes: 10 });
        assert_eq!(response.kind, "upload_too_large");
        assert_eq!(response.error, "Upload exceeds the 10 byte limit");
    }
}
