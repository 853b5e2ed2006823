//! Gateway error types.

use thiserror::Error;

/// Error type for auth gateway calls.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway answered with a non-success status
    #[error("Gateway rejected request: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl GatewayError {
    /// Human-readable message suitable for surfacing to a caller.
    pub fn surface_message(&self) -> String {
        match self {
            GatewayError::Rejected { message, .. } if !message.is_empty() => message.clone(),
            GatewayError::Http(e) if e.is_connect() || e.is_timeout() => {
                "Could not reach the server".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias using GatewayError.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_message_prefers_gateway_message() {
        let err = GatewayError::Rejected {
            status: 401,
            message: "Invalid credentials".to_string(),
        };
        assert_eq!(err.surface_message(), "Invalid credentials");
    }
}
