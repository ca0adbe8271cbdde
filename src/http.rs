use reqwest::blocking::Response;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::RipError;

pub fn default_headers() -> Result<HeaderMap, RipError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("accu-rip/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| RipError::InvalidConfig(err.to_string()))?,
    );
    Ok(headers)
}

/// Splits a non-2xx response into its status code and body text.
pub fn failed_status(response: Response, fallback: &str) -> (u16, String) {
    let status = response.status().as_u16();
    let message = response.text().unwrap_or_else(|_| fallback.to_string());
    (status, message)
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
