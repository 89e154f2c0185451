use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Unsupported media type: {0} (expected image/jpeg or image/png)")]
    UnsupportedMediaType(String),

    #[error("Upload exceeds the {limit_bytes} byte limit")]
    UploadTooLarge { limit_bytes: usize },

    #[error("Model '{model_id}' is unavailable: {message}")]
    ModelUnavailable { model_id: String, message: String },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Model call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("Invalid state transition: {current} -> {requested}")]
    InvalidTransition { current: String, requested: String },

    #[error("Question not found: {index}")]
    QuestionNotFound { index: usize },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Self::Config(s) => Self::Config(s.clone()),
            Self::Decode(s) => Self::Decode(s.clone()),
            Self::UnsupportedMediaType(s) => Self::UnsupportedMediaType(s.clone()),
            Self::UploadTooLarge { limit_bytes } => Self::UploadTooLarge {
                limit_bytes: *limit_bytes,
            },
            Self::ModelUnavailable { model_id, message } => Self::ModelUnavailable {
                model_id: model_id.clone(),
                message: message.clone(),
            },
            Self::Inference(s) => Self::Inference(s.clone()),
            Self::Timeout { seconds } => Self::Timeout { seconds: *seconds },
            Self::InvalidTransition { current, requested } => Self::InvalidTransition {
                current: current.clone(),
                requested: requested.clone(),
            },
            Self::QuestionNotFound { index } => Self::QuestionNotFound { index: *index },
            Self::SessionNotFound { session_id } => Self::SessionNotFound {
                session_id: session_id.clone(),
            },
            Self::Internal(s) => Self::Internal(s.clone()),
            // For errors that can't be cloned, convert to string representation
            Self::Yaml(e) => Self::Internal(format!("YAML error: {}", e)),
            Self::Io(e) => Self::Internal(format!("IO error: {}", e)),
            Self::AddrParse(e) => Self::Internal(format!("Address parse error: {}", e)),
        }
    }
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn model_unavailable(model_id: impl Into<String>, msg: impl ToString) -> Self {
        Self::ModelUnavailable {
            model_id: model_id.into(),
            message: msg.to_string(),
        }
    }

    pub fn inference(msg: impl ToString) -> Self {
        Self::Inference(msg.to_string())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable name, rendered next to the message in API errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Decode(_) | Self::UnsupportedMediaType(_) => "decode_error",
            Self::UploadTooLarge { .. } => "upload_too_large",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::Inference(_) => "inference_error",
            Self::Timeout { .. } => "timeout",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::QuestionNotFound { .. } => "question_not_found",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::Yaml(_)
            | Self::Io(_)
            | Self::AddrParse(_)
            | Self::Internal(_) => "internal",
        }
    }
}
