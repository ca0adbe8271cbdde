pub mod app;
pub mod catalog;
pub mod concurrency;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod fs_util;
pub mod http;
pub mod ingest;
pub mod layout;
pub mod media;
pub mod novelty;
pub mod output;
pub mod playlist;
pub mod store;
