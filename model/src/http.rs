use crate::provider::{ModelError, ModelResult};
use std::time::Duration;

pub(crate) fn build_client(timeout: Duration) -> ModelResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ModelError::Unknown {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Maps a transport failure to `ModelError`. The request URL is stripped so
/// query-string credentials never reach error messages or logs.
pub(crate) fn handle_http_error(provider: &'static str, err: reqwest::Error) -> ModelError {
    let err = err.without_url();
    if err.is_timeout() {
        ModelError::ServiceUnavailable {
            message: format!("{} request timeout", provider),
        }
    } else if err.is_connect() {
        ModelError::ServiceUnavailable {
            message: format!("Cannot connect to {} service", provider),
        }
    } else {
        ModelError::Network(err)
    }
}

/// Passes successful responses through and turns everything else into a
/// `ModelError` carrying the raw response body.
pub(crate) async fn ensure_success(
    provider: &'static str,
    response: reqwest::Response,
) -> ModelResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => ModelError::Authentication,
        429 => ModelError::RateLimit,
        503 => ModelError::ServiceUnavailable {
            message: format!("{} service unavailable: {}", provider, body),
        },
        code => ModelError::Api {
            provider,
            status: code,
            message: body,
        },
    })
}
