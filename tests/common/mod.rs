#![allow(dead_code)]

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use accu_ripper::app::{ProgressEvent, ProgressSink};
use accu_ripper::catalog::ChannelSource;
use accu_ripper::domain::{Channel, ChannelId, Track};
use accu_ripper::error::RipError;
use accu_ripper::playlist::TrackSource;
use accu_ripper::store::{SqliteStore, TrackStore};

pub fn channel(id: &str, name: &str) -> Channel {
    Channel {
        name: name.to_string(),
        id: id.parse().unwrap(),
    }
}

pub fn track(channel: &str, n: usize) -> Track {
    Track {
        channel: channel.parse().unwrap(),
        artist: format!("Artist {}", n % 7),
        album: format!("Album {}", n % 3),
        title: format!("Title {n}"),
        year: 1990 + (n % 30) as i32,
        duration: 200,
        primary_link: format!("https://primary.example/{channel}/{n}.m4a"),
        secondary_link: format!("https://secondary.example/{channel}/{n}.m4a"),
    }
}

pub fn count_tracks(store: &dyn TrackStore) -> usize {
    let mut count = 0;
    store
        .for_each_track(&mut |_| {
            count += 1;
            ControlFlow::Continue(())
        })
        .unwrap();
    count
}

pub struct FixedChannels(pub Vec<Channel>);

impl ChannelSource for FixedChannels {
    fn list_channels(&self) -> Result<Vec<Channel>, RipError> {
        Ok(self.0.clone())
    }
}

pub struct BrokenChannels;

impl ChannelSource for BrokenChannels {
    fn list_channels(&self) -> Result<Vec<Channel>, RipError> {
        Err(RipError::CatalogStatus {
            status: 503,
            message: "unavailable".to_string(),
        })
    }
}

/// Plays back scripted responses in order, then repeats `fallback` forever.
pub struct ScriptedTracks {
    script: Mutex<VecDeque<Result<Vec<Track>, String>>>,
    fallback: Vec<Track>,
    calls: AtomicUsize,
}

impl ScriptedTracks {
    pub fn new(script: Vec<Result<Vec<Track>, String>>, fallback: Vec<Track>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(tracks: Vec<Track>) -> Self {
        Self::new(Vec::new(), tracks)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TrackSource for ScriptedTracks {
    fn list_tracks(&self, _channel: &ChannelId) -> Result<Vec<Track>, RipError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(tracks)) => Ok(tracks),
            Some(Err(message)) => Err(RipError::PlaylistHttp(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Serves each channel its own fixed page.
pub struct PerChannelTracks {
    pages: Vec<(ChannelId, Vec<Track>)>,
    calls: AtomicUsize,
}

impl PerChannelTracks {
    pub fn new(pages: Vec<(ChannelId, Vec<Track>)>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TrackSource for PerChannelTracks {
    fn list_tracks(&self, channel: &ChannelId) -> Result<Vec<Track>, RipError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pages
            .iter()
            .find(|(id, _)| id == channel)
            .map(|(_, tracks)| tracks.clone())
            .unwrap_or_default())
    }
}

/// Wraps a real store and injects failures on demand.
pub struct FlakyStore {
    pub inner: SqliteStore,
    pub fail_channels: AtomicBool,
    pub fail_saves: AtomicBool,
    pub fail_lookups: AtomicBool,
    pub fail_scan: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            fail_channels: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            fail_lookups: AtomicBool::new(false),
            fail_scan: AtomicBool::new(false),
        }
    }
}

impl TrackStore for FlakyStore {
    fn save_channels(&self, channels: &[Channel]) -> Result<(), RipError> {
        if self.fail_channels.load(Ordering::SeqCst) {
            return Err(RipError::Sqlite("disk I/O error".to_string()));
        }
        self.inner.save_channels(channels)
    }

    fn save_tracks(&self, tracks: &[Track]) -> Result<(), RipError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RipError::Sqlite("database is locked".to_string()));
        }
        self.inner.save_tracks(tracks)
    }

    fn get_track_by_link(&self, link: &str) -> Result<Track, RipError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(RipError::Sqlite("database is locked".to_string()));
        }
        self.inner.get_track_by_link(link)
    }

    fn for_each_track(
        &self,
        visit: &mut dyn FnMut(Track) -> ControlFlow<()>,
    ) -> Result<(), RipError> {
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(RipError::Sqlite("cursor broken".to_string()));
        }
        self.inner.for_each_track(visit)
    }

    fn list_channels(&self) -> Result<Vec<Channel>, RipError> {
        self.inner.list_channels()
    }
}

/// Keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn count(&self, matches: impl Fn(&ProgressEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| matches(e)).count()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
