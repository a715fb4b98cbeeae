use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors returned by the file-sharing API.
///
/// `Clone` so that one failed token refresh can be handed to every request
/// that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Shown when the server gives no usable message
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// Maximum length for server messages embedded in errors
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
            None => body.to_string(),
            Some((cut, _)) => format!(
                "{}... (truncated, {} total bytes)",
                &body[..cut],
                body.len()
            ),
        }
    }

    /// Extract the `message` field the server puts in JSON error bodies.
    pub fn server_message(body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.message)
            .filter(|message| !message.trim().is_empty())
            .map(|message| Self::truncate_body(&message))
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::server_message(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            400 | 422 => ApiError::Validation(message),
            code => ApiError::ServerError { status: code, message },
        }
    }

    /// True for the 401 that makes a request eligible for a token refresh.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// The message meant for the user, without the variant prefix.
    pub fn user_message(&self) -> &str {
        match self {
            ApiError::InvalidCredentials(message)
            | ApiError::Conflict(message)
            | ApiError::Validation(message)
            | ApiError::RefreshFailed(message)
            | ApiError::Unauthorized(message)
            | ApiError::AccessDenied(message)
            | ApiError::NotFound(message)
            | ApiError::NetworkError(message)
            | ApiError::InvalidResponse(message) => message,
            ApiError::ServerError { message, .. } => message,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }
}
