use std::thread;

use crate::app::{ChannelReport, ProgressEvent, ProgressSink, RipOptions, RipReport, StopReason};
use crate::catalog::ChannelSource;
use crate::concurrency::CancelToken;
use crate::domain::Channel;
use crate::error::RipError;
use crate::novelty::filter_novel;
use crate::playlist::TrackSource;
use crate::store::TrackStore;

/// Outcome of evaluating one successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    KeepPolling,
    Stalled,
}

/// Consecutive-stall counter of one channel. Lives only as long as its loop.
#[derive(Debug, Clone)]
pub struct PollState {
    stalls: usize,
    limit: usize,
}

impl PollState {
    pub fn new(limit: usize) -> Self {
        Self {
            stalls: 0,
            limit: limit.max(1),
        }
    }

    pub fn stalls(&self) -> usize {
        self.stalls
    }

    /// Any novel track resets the counter; `limit` empty polls in a row end the loop.
    pub fn evaluate(&mut self, novel: usize) -> Evaluation {
        if novel == 0 {
            self.stalls += 1;
        } else {
            self.stalls = 0;
        }
        if self.stalls >= self.limit {
            Evaluation::Stalled
        } else {
            Evaluation::KeepPolling
        }
    }
}

/// Lists channels, registers them, then polls all of them concurrently and waits
/// for every loop to finish.
///
/// Failing to list or register channels aborts the run before any loop starts.
/// Everything that goes wrong inside a loop stays inside that loop.
pub fn discover<C, T, S>(
    channel_source: &C,
    track_source: &T,
    store: &S,
    options: &RipOptions,
    cancel: &CancelToken,
    sink: &dyn ProgressSink,
) -> Result<RipReport, RipError>
where
    C: ChannelSource + ?Sized,
    T: TrackSource + ?Sized,
    S: TrackStore + ?Sized,
{
    let channels = channel_source.list_channels()?;
    sink.event(ProgressEvent::ChannelsDiscovered {
        count: channels.len(),
    });
    store.save_channels(&channels)?;

    let reports = thread::scope(|scope| {
        let handles: Vec<_> = channels
            .iter()
            .map(|channel| {
                let handle = scope.spawn(move || {
                    poll_channel(channel, track_source, store, options, cancel, sink)
                });
                (channel, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (channel, handle) in handles {
            match handle.join() {
                Ok(report) => reports.push(report),
                Err(_) => sink.event(ProgressEvent::PollFailed {
                    channel: channel.id.clone(),
                    error: "poll loop panicked".to_string(),
                }),
            }
        }
        reports
    });

    Ok(RipReport { channels: reports })
}

/// Polls one channel until it stalls or the run is cancelled.
///
/// A failed fetch or novelty check is retried without touching the stall
/// counter. A failed save is reported and the batch is dropped; the next poll
/// sees those tracks as novel again only if the source still lists them.
pub fn poll_channel<T, S>(
    channel: &Channel,
    track_source: &T,
    store: &S,
    options: &RipOptions,
    cancel: &CancelToken,
    sink: &dyn ProgressSink,
) -> ChannelReport
where
    T: TrackSource + ?Sized,
    S: TrackStore + ?Sized,
{
    sink.event(ProgressEvent::PollStarted {
        channel: channel.id.clone(),
        name: channel.name.clone(),
    });

    let mut state = PollState::new(options.stall_limit);
    let mut polls = 0usize;
    let mut failed_polls = 0usize;
    let mut novel_tracks = 0usize;

    let stop = loop {
        if cancel.is_cancelled() {
            break StopReason::Cancelled;
        }

        let fetched = match track_source.list_tracks(&channel.id) {
            Ok(fetched) => fetched,
            Err(err) => {
                failed_polls += 1;
                report_failed_poll(channel, &err, options, sink);
                continue;
            }
        };
        let fetched_count = fetched.len();
        let novel = match filter_novel(store, fetched) {
            Ok(novel) => novel,
            Err(err) => {
                failed_polls += 1;
                report_failed_poll(channel, &err, options, sink);
                continue;
            }
        };

        polls += 1;
        let evaluation = state.evaluate(novel.len());
        sink.event(ProgressEvent::Polled {
            channel: channel.id.clone(),
            fetched: fetched_count,
            novel: novel.len(),
            stalls: state.stalls(),
        });
        if evaluation == Evaluation::Stalled {
            break StopReason::Stalled;
        }

        if novel.is_empty() {
            continue;
        }
        match store.save_tracks(&novel) {
            Ok(()) => novel_tracks += novel.len(),
            Err(err) => sink.event(ProgressEvent::PersistFailed {
                channel: channel.id.clone(),
                dropped: novel.len(),
                error: err.to_string(),
            }),
        }
    };

    sink.event(ProgressEvent::ChannelFinished {
        channel: channel.id.clone(),
        stop,
        polls,
        novel_tracks,
    });

    ChannelReport {
        id: channel.id.clone(),
        name: channel.name.clone(),
        polls,
        failed_polls,
        novel_tracks,
        stop,
    }
}

fn report_failed_poll(
    channel: &Channel,
    err: &RipError,
    options: &RipOptions,
    sink: &dyn ProgressSink,
) {
    sink.event(ProgressEvent::PollFailed {
        channel: channel.id.clone(),
        error: err.to_string(),
    });
    if !options.retry_delay.is_zero() {
        thread::sleep(options.retry_delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stalls_terminate_at_limit() {
        let mut state = PollState::new(3);
        assert_eq!(state.evaluate(0), Evaluation::KeepPolling);
        assert_eq!(state.evaluate(0), Evaluation::KeepPolling);
        assert_eq!(state.evaluate(0), Evaluation::Stalled);
    }

    #[test]
    fn novel_poll_resets_counter() {
        let mut state = PollState::new(3);
        state.evaluate(0);
        state.evaluate(0);
        assert_eq!(state.evaluate(4), Evaluation::KeepPolling);
        assert_eq!(state.stalls(), 0);
        state.evaluate(0);
        assert_eq!(state.evaluate(0), Evaluation::KeepPolling);
        assert_eq!(state.evaluate(0), Evaluation::Stalled);
    }
}
