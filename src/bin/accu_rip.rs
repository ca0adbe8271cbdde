use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use accu_ripper::app::{App, RipOptions, SaveOptions};
use accu_ripper::catalog::CatalogHttpClient;
use accu_ripper::concurrency::CancelToken;
use accu_ripper::config::{ConfigLoader, ResolvedConfig, StoreConfig};
use accu_ripper::error::RipError;
use accu_ripper::layout::DownloadLayout;
use accu_ripper::media::MediaHttpClient;
use accu_ripper::output::{JsonOutput, LogSink, OutputMode, TextOutput};
use accu_ripper::playlist::PlaylistHttpClient;
use accu_ripper::store::Store;

#[derive(Parser)]
#[command(name = "accu-rip")]
#[command(about = "Collects channel playlists into a track store and downloads the tracks")]
#[command(version, author)]
struct Cli {
    /// JSON config file (defaults to accu-rip.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Use the sqlite store at this path
    #[arg(long, global = true, conflicts_with = "redis")]
    sqlite: Option<String>,

    /// Use the redis store at this url
    #[arg(long, global = true)]
    redis: Option<String>,

    /// Root directory for downloaded tracks
    #[arg(long, global = true)]
    downloads: Option<String>,

    /// Print the final report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Discover channels and poll their playlists into the store")]
    Rip(RipArgs),
    #[command(about = "Download every stored track that is not on disk yet")]
    Save,
    #[command(about = "List stored channels")]
    Channels,
}

#[derive(Args)]
struct RipArgs {
    /// Catalog page to discover channels on
    category_url: Option<String>,

    /// Stop starting new polls after this many seconds
    #[arg(long)]
    max_runtime: Option<u64>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<RipError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &RipError) -> u8 {
    match error {
        RipError::ConfigRead(_) | RipError::ConfigParse(_) | RipError::InvalidConfig(_) => 2,
        RipError::CatalogHttp(_)
        | RipError::CatalogStatus { .. }
        | RipError::Sqlite(_)
        | RipError::Redis(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(path) = cli.sqlite {
        config.store = StoreConfig::Sqlite {
            path: Utf8PathBuf::from(path),
        };
    }
    if let Some(url) = cli.redis {
        config.store = StoreConfig::Redis { url };
    }
    if let Some(downloads) = cli.downloads {
        config.downloads_root = Utf8PathBuf::from(downloads);
    }

    let app = App::new(Store::open(&config.store)?);
    let cancel = CancelToken::new();
    cancel.cancel_on_interrupt()?;

    match cli.command {
        Commands::Rip(args) => run_rip(&app, &config, args, &cancel, output_mode),
        Commands::Save => run_save(&app, &config, &cancel, output_mode),
        Commands::Channels => {
            let result = app.channels()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_channels(&result).into_diagnostic(),
                OutputMode::Text => TextOutput::print_channels(&result).into_diagnostic(),
            }
        }
    }
}

fn run_rip(
    app: &App<Store>,
    config: &ResolvedConfig,
    args: RipArgs,
    cancel: &CancelToken,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let catalog_url = args
        .category_url
        .unwrap_or_else(|| config.catalog_url.clone());
    let catalog = CatalogHttpClient::new(catalog_url, config.http_timeout)?;
    let playlist = PlaylistHttpClient::new(config.playlist_url.clone(), config.http_timeout)?;
    tracing::info!(catalog = catalog.catalog_url(), "starting rip");

    if let Some(secs) = args.max_runtime {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            tracing::info!(secs, "max runtime reached, finishing current polls");
            cancel.cancel();
        });
    }

    let report = app.rip(
        &catalog,
        &playlist,
        &RipOptions::from(config),
        cancel,
        &LogSink,
    )?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_rip(&report).into_diagnostic(),
        OutputMode::Text => TextOutput::print_rip(&report).into_diagnostic(),
    }
}

fn run_save(
    app: &App<Store>,
    config: &ResolvedConfig,
    cancel: &CancelToken,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let media = MediaHttpClient::new(config.http_timeout, config.media_timeout)?;
    let layout = DownloadLayout::new(config.downloads_root.clone());
    tracing::info!(root = %layout.root(), workers = config.workers, "starting save");
    let report = app.save(
        &media,
        &layout,
        &SaveOptions::from(config),
        cancel,
        &LogSink,
    )?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_save(&report).into_diagnostic(),
        OutputMode::Text => TextOutput::print_save(&report).into_diagnostic(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(map_exit_code(&RipError::InvalidConfig("x".into())), 2);
        assert_eq!(map_exit_code(&RipError::ConfigParse("x".into())), 2);
        assert_eq!(
            map_exit_code(&RipError::CatalogStatus {
                status: 503,
                message: "down".into()
            }),
            3
        );
        assert_eq!(map_exit_code(&RipError::Sqlite("locked".into())), 3);
        assert_eq!(map_exit_code(&RipError::Redis("refused".into())), 3);
        assert_eq!(map_exit_code(&RipError::Signal("x".into())), 1);
        assert_eq!(map_exit_code(&RipError::Filesystem("x".into())), 1);
    }

    #[test]
    fn rip_accepts_category_and_runtime_budget() {
        let cli = Cli::try_parse_from([
            "accu-rip",
            "--sqlite",
            "t.sqlite",
            "rip",
            "https://www.accuradio.com/jazz/",
            "--max-runtime",
            "60",
        ])
        .unwrap();
        match cli.command {
            Commands::Rip(args) => {
                assert_eq!(
                    args.category_url.as_deref(),
                    Some("https://www.accuradio.com/jazz/")
                );
                assert_eq!(args.max_runtime, Some(60));
            }
            _ => panic!("expected rip"),
        }
        assert_eq!(cli.sqlite.as_deref(), Some("t.sqlite"));
    }

    #[test]
    fn sqlite_and_redis_are_exclusive() {
        assert!(
            Cli::try_parse_from([
                "accu-rip",
                "--sqlite",
                "t.sqlite",
                "--redis",
                "redis://localhost",
                "save"
            ])
            .is_err()
        );
    }
}
