use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use accu_ripper::config::{Config, ConfigLoader, StoreConfig};
use accu_ripper::error::RipError;

#[test]
fn parses_a_full_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("accu-rip.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "catalog_url": "https://www.accuradio.com/jazz/",
            "playlist_url": "http://localhost:8080/playlist",
            "downloads_root": "/srv/music",
            "store": { "backend": "redis", "url": "redis://127.0.0.1:6379/2" },
            "workers": 4,
            "stall_limit": 25,
            "http_timeout_secs": 10,
            "media_timeout_secs": 600,
            "fetch_retry_delay_ms": 250
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();

    assert_eq!(resolved.catalog_url, "https://www.accuradio.com/jazz/");
    assert_eq!(resolved.playlist_url, "http://localhost:8080/playlist/");
    assert_eq!(resolved.downloads_root, Utf8PathBuf::from("/srv/music"));
    assert_eq!(
        resolved.store,
        StoreConfig::Redis {
            url: "redis://127.0.0.1:6379/2".to_string()
        }
    );
    assert_eq!(resolved.workers, 4);
    assert_eq!(resolved.stall_limit, 25);
    assert_eq!(resolved.http_timeout, Duration::from_secs(10));
    assert_eq!(resolved.media_timeout, Some(Duration::from_secs(600)));
    assert_eq!(resolved.fetch_retry_delay, Duration::from_millis(250));
}

#[test]
fn sqlite_backend_takes_a_path() {
    let config: Config =
        serde_json::from_str(r#"{ "store": { "backend": "sqlite", "path": "data/t.sqlite" } }"#)
            .unwrap();
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(
        resolved.store,
        StoreConfig::Sqlite {
            path: Utf8PathBuf::from("data/t.sqlite")
        }
    );
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, RipError::ConfigRead(p) if p == path);
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("accu-rip.json");
    fs::write(&path, "{ workers: 4 ").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, RipError::ConfigParse(_));
}

#[test]
fn zero_workers_is_rejected() {
    let config = Config {
        workers: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(RipError::InvalidConfig(_))
    );
}

#[test]
fn zero_stall_limit_is_rejected() {
    let config = Config {
        stall_limit: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(RipError::InvalidConfig(_))
    );
}

#[test]
fn redis_url_must_use_a_redis_scheme() {
    let config: Config =
        serde_json::from_str(r#"{ "store": { "backend": "redis", "url": "http://localhost" } }"#)
            .unwrap();
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(RipError::InvalidConfig(_))
    );
}

#[test]
fn unknown_schema_version_is_rejected() {
    let config = Config {
        schema_version: Some(2),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(RipError::InvalidConfig(message)) if message.contains("schema_version")
    );
}
