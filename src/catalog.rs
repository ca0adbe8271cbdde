use std::collections::HashSet;
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::domain::{Channel, ChannelId};
use crate::error::RipError;
use crate::http::{default_headers, failed_status, is_retryable_error, is_retryable_status};

static CHANNEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-id=["']([a-fA-F\d]+)["']\s+data-oldid="\d+"\s+data-name=['"](.+?)['"]"#)
        .expect("channel pattern compiles")
});

/// Lists the channels discoverable under one catalog root.
pub trait ChannelSource: Send + Sync {
    fn list_channels(&self) -> Result<Vec<Channel>, RipError>;
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    catalog_url: String,
}

impl CatalogHttpClient {
    pub fn new(catalog_url: impl Into<String>, timeout: Duration) -> Result<Self, RipError> {
        let client = Client::builder()
            .default_headers(default_headers()?)
            .timeout(timeout)
            .build()
            .map_err(|err| RipError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            catalog_url: catalog_url.into(),
        })
    }

    pub fn catalog_url(&self) -> &str {
        &self.catalog_url
    }

    fn send_with_retries(&self) -> Result<reqwest::blocking::Response, RipError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match self.client.get(&self.catalog_url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        warn!(status, attempt, "catalog request will be retried");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        warn!(error = %err, attempt, "catalog request will be retried");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(RipError::CatalogHttp(err.to_string()));
                }
            }
        }
    }
}

impl ChannelSource for CatalogHttpClient {
    fn list_channels(&self) -> Result<Vec<Channel>, RipError> {
        let response = self.send_with_retries()?;
        if !response.status().is_success() {
            let (status, message) = failed_status(response, "catalog request failed");
            return Err(RipError::CatalogStatus { status, message });
        }
        let page = response
            .text()
            .map_err(|err| RipError::CatalogHttp(err.to_string()))?;
        let channels = parse_channels(&page);
        debug!(url = %self.catalog_url, count = channels.len(), "parsed catalog page");
        Ok(channels)
    }
}

/// Extracts `{name, id}` pairs from a catalog page. The page repeats channels,
/// so the first occurrence of each id wins.
pub fn parse_channels(page: &str) -> Vec<Channel> {
    let mut seen = HashSet::new();
    let mut channels = Vec::new();
    for captures in CHANNEL_RE.captures_iter(page) {
        let Ok(id) = captures[1].parse::<ChannelId>() else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        channels.push(Channel {
            name: captures[2].to_string(),
            id,
        });
    }
    channels
}
