use std::ops::ControlFlow;
use std::sync::{Mutex, MutexGuard};

use redis::{Connection, Pipeline};
use tracing::debug;

use crate::domain::{Channel, Track};
use crate::error::RipError;
use crate::store::TrackStore;

pub const TRACKS_KEY: &str = "tracks";
pub const PRIMARY_LINKS_KEY: &str = "tracks:primary";
pub const SECONDARY_LINKS_KEY: &str = "tracks:secondary";
pub const CHANNELS_KEY: &str = "channels";

const SCAN_COUNT: usize = 64;

/// Key-value store on redis. Records are JSON; the derived indexes are sets so
/// that saving the same track twice leaves them unchanged.
pub struct RedisStore {
    conn: Mutex<Connection>,
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self, RipError> {
        let client = redis::Client::open(url).map_err(redis_err)?;
        let mut conn = client.get_connection().map_err(redis_err)?;
        let _: String = redis::cmd("PING").query(&mut conn).map_err(redis_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RipError> {
        self.conn
            .lock()
            .map_err(|_| RipError::Redis("connection lock poisoned".to_string()))
    }

    fn fetch_track(conn: &mut Connection, link: &str) -> Result<Option<Track>, RipError> {
        let raw: Option<Vec<u8>> = redis::cmd("HGET")
            .arg(TRACKS_KEY)
            .arg(link)
            .query(conn)
            .map_err(redis_err)?;
        raw.map(|raw| decode(&raw)).transpose()
    }
}

impl TrackStore for RedisStore {
    fn save_channels(&self, channels: &[Channel]) -> Result<(), RipError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for channel in channels {
            pipe.cmd("HSETNX")
                .arg(CHANNELS_KEY)
                .arg(channel.id.as_str())
                .arg(encode(channel)?)
                .ignore();
        }
        let mut conn = self.lock()?;
        pipe.query::<()>(&mut *conn).map_err(redis_err)
    }

    fn save_tracks(&self, tracks: &[Track]) -> Result<(), RipError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for track in tracks {
            queue_track(&mut pipe, track)?;
        }
        let mut conn = self.lock()?;
        pipe.query::<()>(&mut *conn).map_err(redis_err)
    }

    fn get_track_by_link(&self, link: &str) -> Result<Track, RipError> {
        let mut conn = self.lock()?;
        Self::fetch_track(&mut conn, link)?.ok_or_else(|| RipError::TrackNotFound(link.to_string()))
    }

    fn for_each_track(
        &self,
        visit: &mut dyn FnMut(Track) -> ControlFlow<()>,
    ) -> Result<(), RipError> {
        let mut cursor = 0u64;
        loop {
            let page = {
                let mut conn = self.lock()?;
                let (next, links): (u64, Vec<String>) = redis::cmd("SSCAN")
                    .arg(PRIMARY_LINKS_KEY)
                    .arg(cursor)
                    .arg("COUNT")
                    .arg(SCAN_COUNT)
                    .query(&mut *conn)
                    .map_err(redis_err)?;
                cursor = next;
                let mut page = Vec::with_capacity(links.len());
                for link in links {
                    match Self::fetch_track(&mut conn, &link)? {
                        Some(track) => page.push(track),
                        None => debug!(link = %link, "primary link without record"),
                    }
                }
                page
            };
            for track in page {
                if visit(track).is_break() {
                    return Ok(());
                }
            }
            if cursor == 0 {
                return Ok(());
            }
        }
    }

    fn list_channels(&self) -> Result<Vec<Channel>, RipError> {
        let mut conn = self.lock()?;
        let raw: Vec<Vec<u8>> = redis::cmd("HVALS")
            .arg(CHANNELS_KEY)
            .query(&mut *conn)
            .map_err(redis_err)?;
        let mut channels = raw
            .iter()
            .map(|raw| decode::<Channel>(raw))
            .collect::<Result<Vec<_>, _>>()?;
        channels.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(channels)
    }
}

fn queue_track(pipe: &mut Pipeline, track: &Track) -> Result<(), RipError> {
    let payload = encode(track)?;
    pipe.cmd("HSETNX")
        .arg(TRACKS_KEY)
        .arg(&track.primary_link)
        .arg(&payload)
        .ignore();
    pipe.cmd("HSETNX")
        .arg(TRACKS_KEY)
        .arg(&track.secondary_link)
        .arg(&payload)
        .ignore();
    pipe.cmd("SADD")
        .arg(PRIMARY_LINKS_KEY)
        .arg(&track.primary_link)
        .ignore();
    pipe.cmd("SADD")
        .arg(SECONDARY_LINKS_KEY)
        .arg(&track.secondary_link)
        .ignore();
    for key in index_keys(track) {
        pipe.cmd("SADD").arg(key).arg(&track.primary_link).ignore();
    }
    Ok(())
}

/// Derived indexes: by channel, artist, artist+album, year and artist+year.
pub fn index_keys(track: &Track) -> [String; 5] {
    [
        format!("channel:tracks:{}", track.channel),
        format!("artist:tracks:{}", track.artist),
        format!("artist:album:tracks:{}:{}", track.artist, track.album),
        format!("year:tracks:{}", track.year),
        format!("artist:year:tracks:{}:{}", track.artist, track.year),
    ]
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, RipError> {
    serde_json::to_vec(value).map_err(|err| RipError::StoreCodec(err.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(raw: &[u8]) -> Result<T, RipError> {
    serde_json::from_slice(raw).map_err(|err| RipError::StoreCodec(err.to_string()))
}

fn redis_err(err: redis::RedisError) -> RipError {
    RipError::Redis(err.to_string())
}
