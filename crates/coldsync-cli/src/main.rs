//! coldsync - incremental backup and restore against S3
//!
//! Backs a local tree up to an object-store prefix, uploading only what is
//! newer than its remote copy, and brings it back, including from archival
//! storage classes.

mod display;
mod json_output;
mod progress;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use coldsync_config::{Config, ConfigLoader, LoggingConfig};
use coldsync_store::S3Store;
use coldsync_sync::{SyncEngine, SyncOptions, SyncReport};
use coldsync_types::{GroupDepth, RestoreTier, StorageClass, ThreadCount};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// coldsync - incremental backup and restore against S3
#[derive(Parser)]
#[command(
    name = "coldsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Incremental backup and restore against S3",
    long_about = "coldsync uploads only the files or directory groups that are newer than\n\
                  their remote copies, zstd-compressed, and restores them again, including\n\
                  requesting restoration from archival storage classes."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of concurrent transfers
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Print the final report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Bucket and prefix shared by every command
#[derive(Args)]
struct Target {
    /// Bucket name
    #[arg(long)]
    bucket: String,
    /// Key prefix inside the bucket
    #[arg(long)]
    path: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Request restoration of every archived object under a prefix
    RestoreRequest {
        #[command(flatten)]
        target: Target,
        /// Days the restored copies stay readable
        #[arg(long)]
        days: Option<u32>,
        /// Retrieval tier
        #[arg(long, value_enum)]
        tier: Option<TierArg>,
    },
    /// Download and decompress every file object under a prefix
    Restore {
        #[command(flatten)]
        target: Target,
        /// Local directory to restore into
        #[arg(long)]
        destination: PathBuf,
    },
    /// Download and unpack every archive object under a prefix
    RestoreArchive {
        #[command(flatten)]
        target: Target,
        /// Local directory to restore into
        #[arg(long)]
        destination: PathBuf,
    },
    /// Upload each changed file as its own compressed object
    BackupFlat {
        #[command(flatten)]
        target: Target,
        /// Local directory to back up
        #[arg(long)]
        backup_directory: PathBuf,
        /// Storage class for uploaded objects
        #[arg(long, value_enum)]
        storage_class: Option<StorageClassArg>,
        /// Show what would be uploaded without uploading
        #[arg(long)]
        dry_run: bool,
    },
    /// Upload each changed directory at a depth as one compressed archive
    BackupGrouped {
        #[command(flatten)]
        target: Target,
        /// Local directory to back up
        #[arg(long)]
        backup_directory: PathBuf,
        /// Depth of the directories that become archives
        #[arg(long, value_parser = parse_depth)]
        depth: GroupDepth,
        /// Storage class for uploaded archives
        #[arg(long, value_enum)]
        storage_class: Option<StorageClassArg>,
        /// Show what would be uploaded without uploading
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum StorageClassArg {
    Standard,
    StandardIa,
    IntelligentTiering,
    GlacierIr,
    Glacier,
    DeepArchive,
}

impl From<StorageClassArg> for StorageClass {
    fn from(class: StorageClassArg) -> Self {
        match class {
            StorageClassArg::Standard => StorageClass::Standard,
            StorageClassArg::StandardIa => StorageClass::StandardIa,
            StorageClassArg::IntelligentTiering => StorageClass::IntelligentTiering,
            StorageClassArg::GlacierIr => StorageClass::GlacierInstantRetrieval,
            StorageClassArg::Glacier => StorageClass::Glacier,
            StorageClassArg::DeepArchive => StorageClass::DeepArchive,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum TierArg {
    Standard,
    Bulk,
    Expedited,
}

impl From<TierArg> for RestoreTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Standard => RestoreTier::Standard,
            TierArg::Bulk => RestoreTier::Bulk,
            TierArg::Expedited => RestoreTier::Expedited,
        }
    }
}

fn parse_depth(value: &str) -> std::result::Result<GroupDepth, String> {
    let depth: usize = value.parse().map_err(|e| format!("{}", e))?;
    GroupDepth::new(depth)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {:#}", style("✗").red().bold(), e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<SyncReport> {
    let mut config =
        ConfigLoader::load(cli.config.as_deref()).context("failed to load configuration")?;
    apply_overrides(&mut config, &cli)?;

    init_logging(&cli, &config.logging)?;
    info!("coldsync v{} starting", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    watch_interrupt(cancel.clone());

    let store = Arc::new(S3Store::connect(&config.store).await);
    let show_progress = !cli.quiet && !cli.json;
    let reporter = Arc::new(progress::CliProgress::new(show_progress));

    let mut options = SyncOptions::from_config(&config);
    let label = command_label(&cli.command);
    let report = match cli.command {
        Commands::RestoreRequest { target, .. } => {
            engine(store, options, &reporter, &cancel)
                .request_restore(&target.bucket, &target.path)
                .await
        }
        Commands::Restore {
            target,
            destination,
        } => {
            engine(store, options, &reporter, &cancel)
                .restore(&target.bucket, &target.path, &destination)
                .await
        }
        Commands::RestoreArchive {
            target,
            destination,
        } => {
            engine(store, options, &reporter, &cancel)
                .restore_archive(&target.bucket, &target.path, &destination)
                .await
        }
        Commands::BackupFlat {
            target,
            backup_directory,
            dry_run,
            ..
        } => {
            options.dry_run = dry_run;
            engine(store, options, &reporter, &cancel)
                .backup_flat(&target.bucket, &target.path, &backup_directory)
                .await
        }
        Commands::BackupGrouped {
            target,
            backup_directory,
            depth,
            dry_run,
            ..
        } => {
            options.dry_run = dry_run;
            engine(store, options, &reporter, &cancel)
                .backup_grouped(&target.bucket, &target.path, &backup_directory, depth)
                .await
        }
    };
    reporter.finish();
    let report = report.with_context(|| format!("{} aborted", label))?;

    if cli.json {
        let output = json_output::SyncResultJson::from_report(&report);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !cli.quiet {
        display::print_report(&report);
    }

    if cancel.is_cancelled() {
        warn!("Run interrupted; not-yet-started transfers were skipped");
    }
    Ok(report)
}

fn engine(
    store: Arc<S3Store>,
    options: SyncOptions,
    reporter: &Arc<progress::CliProgress>,
    cancel: &CancellationToken,
) -> SyncEngine {
    SyncEngine::new(store, options)
        .with_progress(reporter.clone())
        .with_cancellation(cancel.clone())
}

fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::RestoreRequest { .. } => "restore-request",
        Commands::Restore { .. } => "restore",
        Commands::RestoreArchive { .. } => "restore-archive",
        Commands::BackupFlat { .. } => "backup-flat",
        Commands::BackupGrouped { .. } => "backup-grouped",
    }
}

/// Command line flags take precedence over file and environment values
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(workers) = cli.workers {
        config.transfer.workers = ThreadCount::new(workers)
            .map_err(anyhow::Error::msg)
            .context("invalid --workers")?;
    }

    match &cli.command {
        Commands::RestoreRequest { days, tier, .. } => {
            if let Some(days) = days {
                anyhow::ensure!(*days > 0, "--days must be at least 1");
                config.restore.days = *days;
            }
            if let Some(tier) = tier {
                config.restore.tier = (*tier).into();
            }
        }
        Commands::BackupFlat {
            storage_class: Some(class),
            ..
        } => config.transfer.storage_class = (*class).into(),
        Commands::BackupGrouped {
            storage_class: Some(class),
            ..
        } => config.transfer.grouped_storage_class = (*class).into(),
        _ => {}
    }
    Ok(())
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log filter")?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let initialized = if logging.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    initialized.map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}

/// Trip `cancel` on the first Ctrl-C
fn watch_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight transfers");
            cancel.cancel();
        }
    });
}
