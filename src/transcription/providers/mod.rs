use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::ServiceError;

pub mod openai_api;

pub use openai_api::OpenAIProvider;

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    r#type: Option<String>,
    code: Option<String>,
}

/// Map a non-success OpenAI response to a [`ServiceError`].
///
/// 429 covers both request rate limits and exhausted quota.
pub(crate) fn openai_error(status: StatusCode, body: &str) -> ServiceError {
    let message = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => format!(
            "{} (type: {:?}, code: {:?})",
            parsed.error.message, parsed.error.r#type, parsed.error.code
        ),
        Err(_) => body.to_string(),
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        ServiceError::RateLimited {
            service: "OpenAI",
            message,
        }
    } else {
        ServiceError::Api {
            service: "OpenAI",
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_maps_to_rate_limited() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let err = openai_error(StatusCode::TOO_MANY_REQUESTS, body);
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("exceeded your current quota"));
    }

    #[test]
    fn test_other_status_keeps_raw_body() {
        let err = openai_error(StatusCode::BAD_GATEWAY, "upstream down");
        match err {
            ServiceError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
