use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PROMPT_REQUIRED: &str = "Please enter a prompt.";
pub const BATTLE_PROMPTS_REQUIRED: &str = "Please enter a prompt for both contenders.";
pub const UNKNOWN_UPSTREAM_FAILURE: &str = "An unknown error occurred. Please try again.";
pub const UPSCALE_FAILED: &str = "Failed to upscale the image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Upstream,
    Upscale,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StudioError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Upscale(String),
}

impl StudioError {
    /// Builds an upstream error from a collaborator failure, falling back to a
    /// generic message when the failure carries none.
    pub fn upstream(message: impl AsRef<str>) -> Self {
        let message = message.as_ref().trim();
        if message.is_empty() {
            Self::Upstream(UNKNOWN_UPSTREAM_FAILURE.to_string())
        } else {
            Self::Upstream(message.to_string())
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StudioError::Validation(_) => ErrorKind::Validation,
            StudioError::Upstream(_) => ErrorKind::Upstream,
            StudioError::Upscale(_) => ErrorKind::Upscale,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StudioError::Validation(message)
            | StudioError::Upstream(message)
            | StudioError::Upscale(message) => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_upstream_message_falls_back_to_generic_text() {
        let error = StudioError::upstream("   ");
        assert_eq!(error.message(), UNKNOWN_UPSTREAM_FAILURE);
        assert_eq!(error.kind(), ErrorKind::Upstream);
    }

    #[test]
    fn upstream_message_is_passed_through() {
        let error = StudioError::upstream("quota exceeded");
        assert_eq!(error.to_string(), "quota exceeded");
    }
}
