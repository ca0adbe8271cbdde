use std::io::{self, Write};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::{ChannelListResult, ProgressEvent, ProgressSink, RipReport, SaveReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_rip(result: &RipReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_save(result: &SaveReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_channels(result: &ChannelListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_rip(result: &RipReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        for channel in &result.channels {
            writeln!(
                stdout,
                "{} ({}): {} new tracks in {} polls, {} failed, stopped: {:?}",
                channel.name,
                channel.id,
                channel.novel_tracks,
                channel.polls,
                channel.failed_polls,
                channel.stop
            )?;
        }
        writeln!(
            stdout,
            "{} channels, {} new tracks",
            result.channels.len(),
            result.novel_tracks()
        )
    }

    pub fn print_save(result: &SaveReport) -> io::Result<()> {
        writeln!(
            io::stdout(),
            "scanned {} tracks: {} downloaded ({} via fallback), {} already present, {} failed{}",
            result.scanned,
            result.downloaded,
            result.fallback,
            result.skipped,
            result.failed,
            if result.cancelled { ", cancelled" } else { "" }
        )
    }

    pub fn print_channels(result: &ChannelListResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        for channel in &result.channels {
            writeln!(stdout, "{}\t{}", channel.id, channel.name)?;
        }
        Ok(())
    }
}

/// Forwards progress to the `tracing` subscriber.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::ChannelsDiscovered { count } => {
                info!(count, "discovered channels");
            }
            ProgressEvent::PollStarted { channel, name } => {
                info!(channel = %channel, name = %name, "started fetching tracks");
            }
            ProgressEvent::Polled {
                channel,
                fetched,
                novel,
                stalls,
            } => {
                debug!(channel = %channel, fetched, novel, stalls, "polled channel");
            }
            ProgressEvent::PollFailed { channel, error } => {
                warn!(channel = %channel, error = %error, "poll failed, retrying");
            }
            ProgressEvent::PersistFailed {
                channel,
                dropped,
                error,
            } => {
                warn!(channel = %channel, dropped, error = %error, "failed to save tracks");
            }
            ProgressEvent::ChannelFinished {
                channel,
                stop,
                polls,
                novel_tracks,
            } => {
                info!(channel = %channel, ?stop, polls, novel_tracks, "stopped fetching tracks");
            }
            ProgressEvent::PartialsRemoved { dir, count } => {
                info!(dir = %dir, count, "removed unfinished downloads");
            }
            ProgressEvent::TrackSkipped { path } => {
                debug!(path = %path, "track already exists");
            }
            ProgressEvent::LinkFailed { path, link, error } => {
                warn!(path = %path, %link, error = %error, "link failed, trying fallback");
            }
            ProgressEvent::TrackSaved { path, link, bytes } => {
                info!(path = %path, %link, bytes, "saved track");
            }
            ProgressEvent::TrackFailed { path, error } => {
                warn!(path = %path, error = %error, "abandoned track");
            }
            ProgressEvent::ScanFinished { scanned } => {
                info!(scanned, "store scan finished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::StopReason;
    use crate::domain::LinkKind;

    #[test]
    fn log_sink_handles_events_under_a_scoped_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let channel: crate::domain::ChannelId = "ab12".parse().unwrap();
        tracing::subscriber::with_default(subscriber, || {
            LogSink.event(ProgressEvent::Polled {
                channel: channel.clone(),
                fetched: 3,
                novel: 1,
                stalls: 0,
            });
            LogSink.event(ProgressEvent::ChannelFinished {
                channel,
                stop: StopReason::Stalled,
                polls: 100,
                novel_tracks: 1,
            });
            LogSink.event(ProgressEvent::LinkFailed {
                path: "downloads/x.m4a".into(),
                link: LinkKind::Primary,
                error: "status 404".to_string(),
            });
        });
    }
}
