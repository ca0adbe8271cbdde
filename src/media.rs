use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::RipError;
use crate::http::{default_headers, failed_status};

/// Opens a media link as a byte stream. Only a successful (2xx) response counts
/// as opened.
pub trait ByteSource: Send + Sync {
    fn open(&self, link: &str) -> Result<Box<dyn Read + Send>, RipError>;
}

#[derive(Clone)]
pub struct MediaHttpClient {
    client: Client,
}

impl MediaHttpClient {
    /// `timeout` bounds a whole transfer including the body; `None` leaves only the
    /// connect timeout in place.
    pub fn new(connect_timeout: Duration, timeout: Option<Duration>) -> Result<Self, RipError> {
        let client = Client::builder()
            .default_headers(default_headers()?)
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|err| RipError::MediaHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ByteSource for MediaHttpClient {
    fn open(&self, link: &str) -> Result<Box<dyn Read + Send>, RipError> {
        let response = self
            .client
            .get(link)
            .send()
            .map_err(|err| RipError::MediaHttp(err.to_string()))?;
        if !response.status().is_success() {
            let (status, message) = failed_status(response, "media request failed");
            return Err(RipError::MediaStatus { status, message });
        }
        Ok(Box::new(response))
    }
}
