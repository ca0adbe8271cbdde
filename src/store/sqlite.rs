use std::ops::ControlFlow;
use std::sync::{Mutex, MutexGuard};

use camino::Utf8Path;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use crate::domain::{Channel, Track};
use crate::error::RipError;
use crate::store::TrackStore;

/// Rows fetched per lock acquisition while scanning.
const SCAN_PAGE_SIZE: i64 = 256;

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS channel (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    data_id TEXT NOT NULL UNIQUE,
    discovered_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS track (
    id INTEGER PRIMARY KEY,
    channel TEXT NOT NULL REFERENCES channel (data_id),
    artist TEXT NOT NULL,
    album TEXT NOT NULL,
    title TEXT NOT NULL,
    duration INTEGER NOT NULL,
    year INTEGER NOT NULL,
    primary_link TEXT NOT NULL UNIQUE,
    secondary_link TEXT NOT NULL UNIQUE,
    discovered_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS track_by_channel ON track (channel);
CREATE INDEX IF NOT EXISTS track_by_artist ON track (artist);
CREATE INDEX IF NOT EXISTS track_by_artist_album ON track (artist, album);
CREATE INDEX IF NOT EXISTS track_by_year ON track (year);
CREATE INDEX IF NOT EXISTS track_by_artist_year ON track (artist, year);
"#;

const TRACK_COLUMNS: &str =
    "id, channel, artist, album, title, duration, year, primary_link, secondary_link";

/// Relational store on a single sqlite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Utf8Path) -> Result<Self, RipError> {
        let conn = Connection::open(path.as_std_path()).map_err(sqlite_err)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RipError> {
        let conn = Connection::open_in_memory().map_err(sqlite_err)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, RipError> {
        conn.execute_batch(SCHEMA).map_err(sqlite_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RipError> {
        self.conn
            .lock()
            .map_err(|_| RipError::Sqlite("connection lock poisoned".to_string()))
    }
}

impl TrackStore for SqliteStore {
    fn save_channels(&self, channels: &[Channel]) -> Result<(), RipError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(sqlite_err)?;
        let now = Utc::now().to_rfc3339();
        for channel in channels {
            insert_channel(&tx, channel, &now)?;
        }
        tx.commit().map_err(sqlite_err)
    }

    fn save_tracks(&self, tracks: &[Track]) -> Result<(), RipError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(sqlite_err)?;
        let now = Utc::now().to_rfc3339();
        for track in tracks {
            insert_track(&tx, track, &now)?;
        }
        tx.commit().map_err(sqlite_err)
    }

    fn get_track_by_link(&self, link: &str) -> Result<Track, RipError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {TRACK_COLUMNS} FROM track WHERE primary_link = ?1 OR secondary_link = ?1"
                ),
                params![link],
                TrackRow::from_row,
            )
            .optional()
            .map_err(sqlite_err)?;
        match row {
            Some(row) => row.into_track(),
            None => Err(RipError::TrackNotFound(link.to_string())),
        }
    }

    fn for_each_track(
        &self,
        visit: &mut dyn FnMut(Track) -> ControlFlow<()>,
    ) -> Result<(), RipError> {
        let mut last_id = 0i64;
        loop {
            let page = {
                let conn = self.lock()?;
                let mut stmt = conn
                    .prepare_cached(&format!(
                        "SELECT {TRACK_COLUMNS} FROM track WHERE id > ?1 ORDER BY id LIMIT ?2"
                    ))
                    .map_err(sqlite_err)?;
                let rows = stmt
                    .query_map(params![last_id, SCAN_PAGE_SIZE], TrackRow::from_row)
                    .map_err(sqlite_err)?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(sqlite_err)?;
                rows
            };
            if page.is_empty() {
                return Ok(());
            }
            for row in page {
                last_id = row.id;
                if visit(row.into_track()?).is_break() {
                    return Ok(());
                }
            }
        }
    }

    fn list_channels(&self) -> Result<Vec<Channel>, RipError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT name, data_id FROM channel ORDER BY id")
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(sqlite_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sqlite_err)?;
        rows.into_iter()
            .map(|(name, id)| {
                Ok(Channel {
                    name,
                    id: id.parse()?,
                })
            })
            .collect()
    }
}

fn insert_channel(tx: &Transaction<'_>, channel: &Channel, now: &str) -> Result<(), RipError> {
    tx.execute(
        "INSERT INTO channel (name, data_id, discovered_at) VALUES (?1, ?2, ?3)
         ON CONFLICT DO NOTHING",
        params![channel.name, channel.id.as_str(), now],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

fn insert_track(tx: &Transaction<'_>, track: &Track, now: &str) -> Result<(), RipError> {
    tx.execute(
        "INSERT INTO track (
            channel, artist, album,
            title, duration, year,
            primary_link, secondary_link, discovered_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT DO NOTHING",
        params![
            track.channel.as_str(),
            track.artist,
            track.album,
            track.title,
            track.duration,
            track.year,
            track.primary_link,
            track.secondary_link,
            now,
        ],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

struct TrackRow {
    id: i64,
    channel: String,
    artist: String,
    album: String,
    title: String,
    duration: u32,
    year: i32,
    primary_link: String,
    secondary_link: String,
}

impl TrackRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            channel: row.get(1)?,
            artist: row.get(2)?,
            album: row.get(3)?,
            title: row.get(4)?,
            duration: row.get(5)?,
            year: row.get(6)?,
            primary_link: row.get(7)?,
            secondary_link: row.get(8)?,
        })
    }

    fn into_track(self) -> Result<Track, RipError> {
        Ok(Track {
            channel: self.channel.parse()?,
            artist: self.artist,
            album: self.album,
            title: self.title,
            year: self.year,
            duration: self.duration,
            primary_link: self.primary_link,
            secondary_link: self.secondary_link,
        })
    }
}

fn sqlite_err(err: rusqlite::Error) -> RipError {
    RipError::Sqlite(err.to_string())
}
