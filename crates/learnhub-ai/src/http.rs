use learnhub_core::{LearnHubError, Result};
use reqwest::Response;

/// Every upstream protocol step is fatal on a non-success status; the
/// response body is embedded in the error.
pub(crate) async fn ensure_success(step: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(LearnHubError::Upstream(format!(
        "{step} failed ({status}): {body}"
    )))
}

pub(crate) fn send_error(step: &str, err: reqwest::Error) -> LearnHubError {
    LearnHubError::Upstream(format!("{step} request error: {err}"))
}

pub(crate) fn decode_error(step: &str, err: reqwest::Error) -> LearnHubError {
    LearnHubError::Upstream(format!("{step} response decode error: {err}"))
}
