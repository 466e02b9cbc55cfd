//! OpenAI-specific error handling.

use lumen_core::Error;

/// OpenAI-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Request too large.
    ContextLengthExceeded,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Convert an OpenAI error into a lumen error.
///
/// `embedding` selects [`Error::Embedding`] over [`Error::Inference`] for
/// failures that are not configuration problems.
pub fn to_lumen_error(code: OpenAIErrorCode, message: &str, embedding: bool) -> Error {
    let provider = |msg: String| {
        if embedding {
            Error::Embedding(msg)
        } else {
            Error::Inference(msg)
        }
    };
    match code {
        OpenAIErrorCode::AuthenticationError => {
            Error::Config(format!("Authentication failed: {}", message))
        }
        OpenAIErrorCode::ModelNotFound => Error::Config(format!("Model not found: {}", message)),
        OpenAIErrorCode::RateLimitExceeded => provider(format!("Rate limit exceeded: {}", message)),
        OpenAIErrorCode::ContextLengthExceeded => provider(format!("Context too long: {}", message)),
        OpenAIErrorCode::ServerError => provider(format!("Server error: {}", message)),
        OpenAIErrorCode::Unknown => provider(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_status_mapping() {
        assert_eq!(
            OpenAIErrorCode::from_response(401, "invalid_api_key"),
            OpenAIErrorCode::AuthenticationError
        );
        assert_eq!(
            OpenAIErrorCode::from_response(429, ""),
            OpenAIErrorCode::RateLimitExceeded
        );
        assert_eq!(
            OpenAIErrorCode::from_response(400, "model_not_found"),
            OpenAIErrorCode::ModelNotFound
        );
        assert_eq!(
            OpenAIErrorCode::from_response(400, "context_length_exceeded"),
            OpenAIErrorCode::ContextLengthExceeded
        );
        assert_eq!(
            OpenAIErrorCode::from_response(503, ""),
            OpenAIErrorCode::ServerError
        );
        assert_eq!(
            OpenAIErrorCode::from_response(418, ""),
            OpenAIErrorCode::Unknown
        );
    }

    #[test]
    fn test_to_lumen_error_kinds() {
        assert!(matches!(
            to_lumen_error(OpenAIErrorCode::AuthenticationError, "bad key", true),
            Error::Config(_)
        ));
        assert!(matches!(
            to_lumen_error(OpenAIErrorCode::ServerError, "down", true),
            Error::Embedding(_)
        ));
        assert!(matches!(
            to_lumen_error(OpenAIErrorCode::ServerError, "down", false),
            Error::Inference(_)
        ));
    }
}
