use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::catalog::ChannelSource;
use crate::concurrency::CancelToken;
use crate::config::{DEFAULT_STALL_LIMIT, DEFAULT_WORKERS, ResolvedConfig};
use crate::domain::{Channel, ChannelId, LinkKind};
use crate::download::{self, TrackDownloader};
use crate::error::RipError;
use crate::ingest;
use crate::layout::DownloadLayout;
use crate::media::ByteSource;
use crate::playlist::TrackSource;
use crate::store::TrackStore;

#[derive(Debug, Clone)]
pub struct RipOptions {
    /// Consecutive polls without a novel track after which a channel is done.
    pub stall_limit: usize,
    /// Pause after a failed poll before the next attempt.
    pub retry_delay: Duration,
}

impl Default for RipOptions {
    fn default() -> Self {
        Self {
            stall_limit: DEFAULT_STALL_LIMIT,
            retry_delay: Duration::ZERO,
        }
    }
}

impl From<&ResolvedConfig> for RipOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            stall_limit: config.stall_limit,
            retry_delay: config.fetch_retry_delay,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub workers: usize,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl From<&ResolvedConfig> for SaveOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            workers: config.workers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    Stalled,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub id: ChannelId,
    pub name: String,
    /// Successful fetches that reached evaluation.
    pub polls: usize,
    pub failed_polls: usize,
    /// Tracks in batches this channel saved successfully. A track the store
    /// skipped as already present (listed twice, or saved by another channel
    /// in between) is still counted, so the sum over channels can exceed the
    /// number of tracks actually added.
    pub novel_tracks: usize,
    pub stop: StopReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct RipReport {
    pub channels: Vec<ChannelReport>,
}

impl RipReport {
    pub fn novel_tracks(&self) -> usize {
        self.channels.iter().map(|c| c.novel_tracks).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SaveReport {
    pub scanned: usize,
    pub downloaded: usize,
    /// Downloads served by the secondary link. Included in `downloaded`.
    pub fallback: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelListResult {
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    ChannelsDiscovered {
        count: usize,
    },
    PollStarted {
        channel: ChannelId,
        name: String,
    },
    Polled {
        channel: ChannelId,
        fetched: usize,
        novel: usize,
        stalls: usize,
    },
    PollFailed {
        channel: ChannelId,
        error: String,
    },
    PersistFailed {
        channel: ChannelId,
        dropped: usize,
        error: String,
    },
    ChannelFinished {
        channel: ChannelId,
        stop: StopReason,
        polls: usize,
        novel_tracks: usize,
    },
    PartialsRemoved {
        dir: Utf8PathBuf,
        count: usize,
    },
    TrackSkipped {
        path: Utf8PathBuf,
    },
    LinkFailed {
        path: Utf8PathBuf,
        link: LinkKind,
        error: String,
    },
    TrackSaved {
        path: Utf8PathBuf,
        link: LinkKind,
        bytes: u64,
    },
    TrackFailed {
        path: Utf8PathBuf,
        error: String,
    },
    ScanFinished {
        scanned: usize,
    },
}

/// Receives progress from every worker thread of a run.
pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

/// Entry operations over one store: ingestion (`rip`) and retrieval (`save`).
pub struct App<S: TrackStore> {
    store: S,
}

impl<S: TrackStore> App<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Discovers channels and polls each until it stalls or `cancel` fires.
    pub fn rip<C, T>(
        &self,
        channels: &C,
        tracks: &T,
        options: &RipOptions,
        cancel: &CancelToken,
        sink: &dyn ProgressSink,
    ) -> Result<RipReport, RipError>
    where
        C: ChannelSource,
        T: TrackSource,
    {
        ingest::discover(channels, tracks, &self.store, options, cancel, sink)
    }

    /// Downloads every stored track not yet present under `layout`.
    pub fn save<B: ByteSource>(
        &self,
        media: &B,
        layout: &DownloadLayout,
        options: &SaveOptions,
        cancel: &CancelToken,
        sink: &dyn ProgressSink,
    ) -> Result<SaveReport, RipError> {
        let downloader = TrackDownloader::new(media, layout);
        download::dispatch(&self.store, &downloader, options, cancel, sink)
    }

    pub fn channels(&self) -> Result<ChannelListResult, RipError> {
        Ok(ChannelListResult {
            channels: self.store.list_channels()?,
        })
    }
}
