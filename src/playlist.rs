use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::{ChannelId, Track};
use crate::error::RipError;
use crate::http::{default_headers, failed_status};

/// Every delivery location serves the same container.
pub const MEDIA_EXTENSION: &str = ".m4a";

/// Returns the page of tracks a channel currently exposes.
pub trait TrackSource: Send + Sync {
    fn list_tracks(&self, channel: &ChannelId) -> Result<Vec<Track>, RipError>;
}

#[derive(Clone)]
pub struct PlaylistHttpClient {
    client: Client,
    base_url: String,
}

impl PlaylistHttpClient {
    /// `base_url` must end with a slash; the channel id is appended to it.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RipError> {
        let client = Client::builder()
            .default_headers(default_headers()?)
            .timeout(timeout)
            .build()
            .map_err(|err| RipError::PlaylistHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn playlist_url(&self, channel: &ChannelId) -> String {
        format!("{}{}/", self.base_url, channel.as_str())
    }
}

impl TrackSource for PlaylistHttpClient {
    fn list_tracks(&self, channel: &ChannelId) -> Result<Vec<Track>, RipError> {
        let url = self.playlist_url(channel);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| RipError::PlaylistHttp(err.to_string()))?;
        if !response.status().is_success() {
            let (status, message) = failed_status(response, "playlist request failed");
            return Err(RipError::PlaylistStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| RipError::PlaylistHttp(err.to_string()))?;
        decode_playlist(channel, &body)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawAlbum {
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: String,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(default)]
    album: RawAlbum,
    #[serde(default)]
    track_artist: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    primary: String,
    #[serde(default)]
    secondary: String,
    #[serde(default, rename = "fn")]
    file_name: String,
    #[serde(default)]
    duration: f64,
}

impl RawTrack {
    fn into_track(self, channel: &ChannelId) -> Track {
        Track {
            channel: channel.clone(),
            artist: self.track_artist,
            album: self.album.title,
            title: self.title,
            year: self.album.year.trim().parse().unwrap_or(0),
            duration: self.duration.max(0.0) as u32,
            primary_link: format!("{}{}{MEDIA_EXTENSION}", self.primary, self.file_name),
            secondary_link: format!("{}{}{MEDIA_EXTENSION}", self.secondary, self.file_name),
        }
    }
}

/// Decodes one playlist response into tracks attributed to `channel`.
pub fn decode_playlist(channel: &ChannelId, body: &str) -> Result<Vec<Track>, RipError> {
    let raw: Vec<RawTrack> =
        serde_json::from_str(body).map_err(|err| RipError::PlaylistDecode(err.to_string()))?;
    Ok(raw.into_iter().map(|raw| raw.into_track(channel)).collect())
}
