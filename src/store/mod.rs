use std::ops::ControlFlow;

use tracing::info;

use crate::config::StoreConfig;
use crate::domain::{Channel, Track};
use crate::error::RipError;

pub mod kv;
pub mod sqlite;

pub use kv::RedisStore;
pub use sqlite::SqliteStore;

/// Durable keyed storage for channels and tracks.
///
/// Implementations do their own locking: independent channel loops read and
/// write concurrently through a shared reference.
pub trait TrackStore: Send + Sync {
    /// Idempotent upsert. Re-saving a known id changes nothing.
    fn save_channels(&self, channels: &[Channel]) -> Result<(), RipError>;

    /// Writes the batch as one unit: after an error none of it is visible.
    /// A track whose link is already stored is skipped, not reported.
    fn save_tracks(&self, tracks: &[Track]) -> Result<(), RipError>;

    /// Looks a track up by either of its links. A miss is
    /// [`RipError::TrackNotFound`].
    fn get_track_by_link(&self, link: &str) -> Result<Track, RipError>;

    /// Visits every stored track once, in no particular order, until the visitor
    /// breaks. The scan cannot resume midway; call again to start over.
    fn for_each_track(
        &self,
        visit: &mut dyn FnMut(Track) -> ControlFlow<()>,
    ) -> Result<(), RipError>;

    fn list_channels(&self) -> Result<Vec<Channel>, RipError>;
}

/// The store backends a run can be pointed at.
pub enum Store {
    Relational(SqliteStore),
    KeyValue(RedisStore),
}

impl Store {
    pub fn open(config: &StoreConfig) -> Result<Self, RipError> {
        match config {
            StoreConfig::Sqlite { path } => {
                info!(path = %path, "opening sqlite store");
                Ok(Store::Relational(SqliteStore::open(path)?))
            }
            StoreConfig::Redis { url } => {
                info!(url = %url, "opening redis store");
                Ok(Store::KeyValue(RedisStore::open(url)?))
            }
        }
    }

    fn inner(&self) -> &dyn TrackStore {
        match self {
            Store::Relational(store) => store,
            Store::KeyValue(store) => store,
        }
    }
}

impl TrackStore for Store {
    fn save_channels(&self, channels: &[Channel]) -> Result<(), RipError> {
        self.inner().save_channels(channels)
    }

    fn save_tracks(&self, tracks: &[Track]) -> Result<(), RipError> {
        self.inner().save_tracks(tracks)
    }

    fn get_track_by_link(&self, link: &str) -> Result<Track, RipError> {
        self.inner().get_track_by_link(link)
    }

    fn for_each_track(
        &self,
        visit: &mut dyn FnMut(Track) -> ControlFlow<()>,
    ) -> Result<(), RipError> {
        self.inner().for_each_track(visit)
    }

    fn list_channels(&self) -> Result<Vec<Channel>, RipError> {
        self.inner().list_channels()
    }
}

impl<S: TrackStore + ?Sized> TrackStore for &S {
    fn save_channels(&self, channels: &[Channel]) -> Result<(), RipError> {
        (**self).save_channels(channels)
    }

    fn save_tracks(&self, tracks: &[Track]) -> Result<(), RipError> {
        (**self).save_tracks(tracks)
    }

    fn get_track_by_link(&self, link: &str) -> Result<Track, RipError> {
        (**self).get_track_by_link(link)
    }

    fn for_each_track(
        &self,
        visit: &mut dyn FnMut(Track) -> ControlFlow<()>,
    ) -> Result<(), RipError> {
        (**self).for_each_track(visit)
    }

    fn list_channels(&self) -> Result<Vec<Channel>, RipError> {
        (**self).list_channels()
    }
}
