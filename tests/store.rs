mod common;

use std::ops::ControlFlow;

use camino::Utf8PathBuf;

use accu_ripper::config::StoreConfig;
use accu_ripper::store::{RedisStore, SqliteStore, Store, TrackStore};

use common::{channel, count_tracks, track};

fn temp_db() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("tracks.sqlite")).unwrap();
    (temp, path)
}

/// Behavior every backend has to share.
fn exercise_store(store: &dyn TrackStore) {
    store
        .save_channels(&[channel("a1", "Indie"), channel("b2", "Jazz")])
        .unwrap();
    store.save_channels(&[channel("a1", "Renamed")]).unwrap();
    let channels = store.list_channels().unwrap();
    assert_eq!(channels.len(), 2);
    let indie = channels.iter().find(|c| c.id.as_str() == "a1").unwrap();
    assert_eq!(indie.name, "Indie");

    let first = track("a1", 1);
    store.save_tracks(&[first.clone(), track("b2", 2)]).unwrap();
    assert_eq!(store.get_track_by_link(&first.primary_link).unwrap(), first);
    assert_eq!(store.get_track_by_link(&first.secondary_link).unwrap(), first);
    assert!(
        store
            .get_track_by_link("https://nowhere.example/x.m4a")
            .unwrap_err()
            .is_not_found()
    );

    store.save_tracks(&[first.clone(), track("a1", 3)]).unwrap();
    assert_eq!(count_tracks(store), 3);

    let mut visited = 0;
    store
        .for_each_track(&mut |_| {
            visited += 1;
            ControlFlow::Break(())
        })
        .unwrap();
    assert_eq!(visited, 1);
}

#[test]
fn sqlite_store_contract() {
    let (_temp, path) = temp_db();
    let store = SqliteStore::open(&path).unwrap();
    exercise_store(&store);
}

#[test]
fn sqlite_store_survives_reopen() {
    let (_temp, path) = temp_db();
    {
        let store = SqliteStore::open(&path).unwrap();
        store.save_channels(&[channel("a1", "Indie")]).unwrap();
        store.save_tracks(&[track("a1", 1), track("a1", 2)]).unwrap();
    }

    let store = Store::open(&StoreConfig::Sqlite { path }).unwrap();
    assert_eq!(count_tracks(&store), 2);
    assert_eq!(store.list_channels().unwrap().len(), 1);
    assert_eq!(
        store
            .get_track_by_link(&track("a1", 2).secondary_link)
            .unwrap()
            .title,
        "Title 2"
    );
}

#[test]
fn empty_store_scans_nothing() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(count_tracks(&store), 0);
    assert!(store.list_channels().unwrap().is_empty());
}

#[test]
#[ignore = "needs a scratch redis server in REDIS_URL"]
fn redis_store_contract() {
    let url = std::env::var("REDIS_URL").unwrap();
    let store = RedisStore::open(&url).unwrap();
    let mut conn = redis::Client::open(url.as_str())
        .unwrap()
        .get_connection()
        .unwrap();
    let _: () = redis::cmd("FLUSHDB").query(&mut conn).unwrap();

    exercise_store(&store);
}
