use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use comicdb_sync::config::Settings;
use comicdb_sync::progress::{format_duration, ChannelProgress, ConsoleProgress, ProgressSink};
use comicdb_sync::safety::backup_store;
use comicdb_sync::{run, CancelToken, RunConfig, RunState};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "comicdb-sync")]
#[command(version)]
#[command(about = "Merge ComicRack library metadata into a YACReader library database")]
struct Args {
    /// YACReader library database (library.ydb)
    #[arg(long)]
    db: Option<PathBuf>,

    /// ComicRack library export (ComicDb.xml)
    #[arg(long)]
    xml: Option<PathBuf>,

    /// TOML settings file providing default paths and options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overwrite every mapped field except the current page
    #[arg(long)]
    overwrite_all: bool,

    /// Log each UPDATE statement with its values filled in
    #[arg(long)]
    show_query: bool,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Hide the progress bar and log progress periodically instead
    #[arg(long)]
    log_only: bool,

    /// Copy the database to <name>-backup.<ext> before writing
    #[arg(long)]
    backup: bool,

    /// Write the run report as JSON
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl Args {
    fn run_config(&self, settings: &Settings) -> Result<RunConfig> {
        let store_path = self
            .db
            .clone()
            .or_else(|| settings.db_path())
            .context("No YACReader database given (use --db or [paths] db_path)")?;
        let source_path = self
            .xml
            .clone()
            .or_else(|| settings.xml_path())
            .context("No ComicRack XML file given (use --xml or [paths] xml_path)")?;

        Ok(RunConfig {
            store_path,
            source_path,
            overwrite_all: self.overwrite_all || settings.options.overwrite_all,
            verbose: self.show_query || settings.options.show_query,
        })
    }
}

fn init_tracing(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("comicdb_sync={}", level.as_filter()))),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level);

    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let config = args.run_config(&settings)?;

    if args.backup {
        let backup = backup_store(&config.store_path, &config.source_path)?;
        info!("Backed up database to {}", backup.display());
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel()).context("Failed to install Ctrl+C handler")?;
    }

    let start = Instant::now();
    let console = ConsoleProgress::new("Reconciling", args.log_only);
    let (tx, rx) = crossbeam_channel::unbounded();

    // The run owns the database; this thread only draws progress
    let worker = {
        let cancel = cancel.clone();
        std::thread::spawn(move || run(config, &ChannelProgress::new(tx), &cancel))
    };
    for (current, total) in rx {
        console.report(current, total);
    }
    let report = worker
        .join()
        .map_err(|_| anyhow!("Reconciliation thread panicked"))?;

    let stats = report.stats;
    console.finish(format!("{:?}", report.state));
    console.suspend(|| {
        println!("\n{:=<60}", "");
        println!("Reconciliation {:?}", report.state);
        println!("  Updated:   {}", stats.updated);
        println!("  Unchanged: {}", stats.unchanged);
        println!("  Not found: {}", stats.missing);
        println!("  Elapsed:   {}", format_duration(start.elapsed()));
        println!("{:=<60}", "");
    });

    if let Some(path) = &args.stats_json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run report {}", path.display()))?;
    }

    match report.state {
        RunState::Completed => Ok(()),
        RunState::Cancelled => {
            warn!("Run cancelled; remaining comics were not processed");
            Ok(())
        }
        state => bail!("Reconciliation ended {:?}", state),
    }
}
