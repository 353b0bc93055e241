use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("invalid parameter `{param}`: {reason}")]
    Validation { param: &'static str, reason: String },

    #[error("unsupported image `{0}`")]
    UnsupportedFormat(String),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("render task failed: {0}")]
    Task(#[from] JoinError),

    #[error("rendering engine is shut down")]
    Unavailable,
}

impl ChartError {
    pub fn validation(param: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            param,
            reason: reason.into(),
        }
    }

    /// HTTP status the error maps to at the route boundary.
    pub fn status(&self) -> u16 {
        match self {
            ChartError::Validation { .. } => 400,
            ChartError::UnsupportedFormat(_) => 404,
            ChartError::Encode(_) | ChartError::Task(_) => 500,
            ChartError::Unavailable => 503,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }
}

pub type ChartResult<T> = Result<T, ChartError>;
