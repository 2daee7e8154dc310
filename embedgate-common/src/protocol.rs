//! Wire types shared between the gateway and the inference server.
//!
//! The gateway accepts `EmbedRequest` from clients and forwards it verbatim
//! to the inference server, so both tiers validate with the same rules and
//! speak the same response and error schemas.

use serde::{Deserialize, Serialize};

/// Maximum accepted input length, counted in Unicode code points.
pub const MAX_INPUT_CODEPOINTS: usize = 1024;

/// Request body for embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// Input text to embed.
    pub input_text: String,
}

/// Violations of the input constraints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("input_text must not be empty")]
    Empty,
    #[error("input_text exceeds {MAX_INPUT_CODEPOINTS} characters (got {0})")]
    TooLong(usize),
}

impl EmbedRequest {
    /// Validate the request and return the trimmed input text.
    ///
    /// Rules: non-empty after trimming whitespace, at most
    /// [`MAX_INPUT_CODEPOINTS`] code points.
    pub fn validated(&self) -> Result<String, ValidationError> {
        let trimmed = self.input_text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }
        let len = trimmed.chars().count();
        if len > MAX_INPUT_CODEPOINTS {
            return Err(ValidationError::TooLong(len));
        }
        Ok(trimmed.to_string())
    }
}

/// Response body for embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embedding: Vec<f32>,
    pub model: String,
}

/// Structured error body returned by both tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error type or message.
    pub error: String,
    /// Detailed error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Stable code for programmatic handling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, detail: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            detail: Some(detail.into()),
            code: Some(code.to_string()),
        }
    }
}

/// Rate limit error body with retry information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub code: String,
    /// Seconds until the limit resets.
    pub retry_after: u64,
    /// The threshold that was exceeded.
    pub limit: u32,
    /// Which window denied the request ("minute", "hour" or "unavailable").
    pub limit_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_trims_input() {
        let req = EmbedRequest {
            input_text: "  hello world  ".to_string(),
        };
        assert_eq!(req.validated().unwrap(), "hello world");
    }

    #[test]
    fn test_validated_rejects_empty() {
        let req = EmbedRequest {
            input_text: String::new(),
        };
        assert_eq!(req.validated(), Err(ValidationError::Empty));
    }

    #[test]
    fn test_validated_rejects_whitespace_only() {
        let req = EmbedRequest {
            input_text: "   \n\t ".to_string(),
        };
        assert_eq!(req.validated(), Err(ValidationError::Empty));
    }

    #[test]
    fn test_validated_accepts_max_length() {
        let req = EmbedRequest {
            input_text: "a".repeat(MAX_INPUT_CODEPOINTS),
        };
        assert!(req.validated().is_ok());
    }

    #[test]
    fn test_validated_rejects_over_max_length() {
        let req = EmbedRequest {
            input_text: "a".repeat(MAX_INPUT_CODEPOINTS + 1),
        };
        assert_eq!(
            req.validated(),
            Err(ValidationError::TooLong(MAX_INPUT_CODEPOINTS + 1))
        );
    }

    #[test]
    fn test_validated_counts_codepoints_not_bytes() {
        // 1024 multi-byte characters are within the limit.
        let req = EmbedRequest {
            input_text: "é".repeat(MAX_INPUT_CODEPOINTS),
        };
        assert!(req.validated().is_ok());
    }

    #[test]
    fn test_error_body_skips_absent_fields() {
        let body = ErrorBody {
            error: "boom".to_string(),
            detail: None,
            code: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("detail"));
        assert!(!json.contains("code"));
    }

    #[test]
    fn test_rate_limit_body_serialization() {
        let body = RateLimitErrorBody {
            error: "Rate limit exceeded".to_string(),
            detail: None,
            code: "RATE_LIMIT_EXCEEDED".to_string(),
            retry_after: 58,
            limit: 2,
            limit_type: "minute".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains(r#""retry_after":58"#));
        assert!(json.contains(r#""limit_type":"minute""#));
    }
}
