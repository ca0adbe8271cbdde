use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Mutex, PoisonError};
use std::thread;

use camino::Utf8PathBuf;

use crate::app::{ProgressEvent, ProgressSink, SaveOptions, SaveReport};
use crate::concurrency::{CancelToken, WorkerPool};
use crate::domain::{ChannelId, LinkKind, Track};
use crate::error::RipError;
use crate::fs_util::{self, WriteOutcome};
use crate::layout::DownloadLayout;
use crate::media::ByteSource;
use crate::store::TrackStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The destination already existed; no link was opened.
    Skipped { path: Utf8PathBuf },
    Saved {
        path: Utf8PathBuf,
        link: LinkKind,
        bytes: u64,
    },
}

/// Fetches one track to its layout path, falling back from the primary to the
/// secondary link once.
pub struct TrackDownloader<'a, B: ?Sized> {
    media: &'a B,
    layout: &'a DownloadLayout,
}

impl<'a, B: ByteSource + ?Sized> TrackDownloader<'a, B> {
    pub fn new(media: &'a B, layout: &'a DownloadLayout) -> Self {
        Self { media, layout }
    }

    pub fn layout(&self) -> &DownloadLayout {
        self.layout
    }

    /// `channel_label` names the channel directory. Errors mean the track was
    /// abandoned; nothing is left at the destination in that case.
    pub fn download(
        &self,
        channel_label: &str,
        track: &Track,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadOutcome, RipError> {
        let path = self.layout.track_path(channel_label, track);
        if fs_util::exists(&path)? {
            return Ok(DownloadOutcome::Skipped { path });
        }
        fs_util::ensure_dir(&self.layout.channel_dir(channel_label))?;

        let (link, mut stream) = match self.media.open(track.link(LinkKind::Primary)) {
            Ok(stream) => (LinkKind::Primary, stream),
            Err(primary_err) => {
                sink.event(ProgressEvent::LinkFailed {
                    path: path.clone(),
                    link: LinkKind::Primary,
                    error: primary_err.to_string(),
                });
                let stream = self.media.open(track.link(LinkKind::Secondary))?;
                (LinkKind::Secondary, stream)
            }
        };

        match fs_util::write_stream_atomic(&path, &mut stream)? {
            WriteOutcome::Written { bytes } => Ok(DownloadOutcome::Saved { path, link, bytes }),
            WriteOutcome::AlreadyPresent => Ok(DownloadOutcome::Skipped { path }),
        }
    }
}

/// Scans the whole store and downloads each track on a pool of `options.workers`
/// threads. The scan waits for a free worker before handing out the next track,
/// so it never runs ahead of the downloads.
///
/// Unfinished downloads left in the channel directories by an interrupted run
/// are removed before the scan starts.
///
/// Only a failing scan is an error; failed tracks are counted and reported.
pub fn dispatch<S, B>(
    store: &S,
    downloader: &TrackDownloader<'_, B>,
    options: &SaveOptions,
    cancel: &CancelToken,
    sink: &dyn ProgressSink,
) -> Result<SaveReport, RipError>
where
    S: TrackStore + ?Sized,
    B: ByteSource + ?Sized,
{
    let labels: HashMap<ChannelId, String> = store
        .list_channels()?
        .into_iter()
        .map(|channel| (channel.id, channel.name))
        .collect();
    for label in labels.values() {
        let dir = downloader.layout().channel_dir(label);
        let count = fs_util::remove_partials(&dir)?;
        if count > 0 {
            sink.event(ProgressEvent::PartialsRemoved { dir, count });
        }
    }
    let pool = WorkerPool::new(options.workers);
    let report = Mutex::new(SaveReport::default());

    let (scanned, cancelled) = thread::scope(|scope| {
        let mut scanned = 0usize;
        let mut cancelled = false;
        let result = store.for_each_track(&mut |track| {
            if cancel.is_cancelled() {
                cancelled = true;
                return ControlFlow::Break(());
            }
            scanned += 1;
            let permit = pool.acquire();
            let label = labels
                .get(&track.channel)
                .cloned()
                .unwrap_or_else(|| track.channel.to_string());
            let report = &report;
            scope.spawn(move || {
                let _permit = permit;
                let outcome = downloader.download(&label, &track, sink);
                record(report, outcome, downloader, &label, &track, sink);
            });
            ControlFlow::Continue(())
        });
        result.map(|()| (scanned, cancelled))
    })?;

    sink.event(ProgressEvent::ScanFinished { scanned });
    let mut report = report.into_inner().unwrap_or_else(PoisonError::into_inner);
    report.scanned = scanned;
    report.cancelled = cancelled;
    Ok(report)
}

fn record<B: ByteSource + ?Sized>(
    report: &Mutex<SaveReport>,
    outcome: Result<DownloadOutcome, RipError>,
    downloader: &TrackDownloader<'_, B>,
    label: &str,
    track: &Track,
    sink: &dyn ProgressSink,
) {
    let mut report = report.lock().unwrap_or_else(PoisonError::into_inner);
    match outcome {
        Ok(DownloadOutcome::Skipped { path }) => {
            report.skipped += 1;
            sink.event(ProgressEvent::TrackSkipped { path });
        }
        Ok(DownloadOutcome::Saved { path, link, bytes }) => {
            report.downloaded += 1;
            if link == LinkKind::Secondary {
                report.fallback += 1;
            }
            sink.event(ProgressEvent::TrackSaved { path, link, bytes });
        }
        Err(err) => {
            report.failed += 1;
            sink.event(ProgressEvent::TrackFailed {
                path: downloader.layout().track_path(label, track),
                error: err.to_string(),
            });
        }
    }
}
