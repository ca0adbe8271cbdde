use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::Track;
use crate::playlist::MEDIA_EXTENSION;

/// Where downloaded media lands. A track's path is fully determined by its
/// metadata, so an existing file means the track was already fetched.
#[derive(Debug, Clone)]
pub struct DownloadLayout {
    root: Utf8PathBuf,
}

impl DownloadLayout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn channel_dir(&self, channel_label: &str) -> Utf8PathBuf {
        self.root.join(clean_component(channel_label))
    }

    /// `<root>/<channel>/<artist>_-_<album>_-_<year>_-_<title>.m4a`
    pub fn track_path(&self, channel_label: &str, track: &Track) -> Utf8PathBuf {
        let file_name = format!(
            "{}_-_{}_-_{}_-_{}{MEDIA_EXTENSION}",
            clean_component(&track.artist),
            clean_component(&track.album),
            track.year,
            clean_component(&track.title),
        );
        self.channel_dir(channel_label).join(file_name)
    }
}

/// Makes a metadata value safe to use as one path component.
pub fn clean_component(value: &str) -> String {
    let cleaned = value.replace(['/', '\\'], "_");
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
