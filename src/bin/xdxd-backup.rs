// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use xdxd_backup::{
    archive::{
        self,
        cleanup::{execute_deletions, plan_deletions},
        exec::is_executable_in_path,
        invocation::RAR,
    },
    backup_ignore::{read_ignore_lines, translate},
    config::read_settings,
    path::absolute,
    ArchiveStore, BackupJob, BackupTimestamp, CompressionLevel, ExecutionContext, Settings,
};

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs::metadata,
    io::{ErrorKind, IsTerminal},
    path::PathBuf,
    process::exit,
    time::Duration,
};
use tracing::{debug, error, info, Level};
use tracing_subscriber::{
    fmt::{self, writer::MakeWriterExt},
    prelude::*,
    EnvFilter,
};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "xdxd-backup",
    about,
    version,
    disable_version_flag = true,
    subcommand_help_heading = "Commands"
)]
struct Cli {
    /// Display version number.
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,

    /// Echo external commands before running them.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        match self.command {
            Command::Create(opts) => run_create(opts, self.verbose).await,
            Command::CleanFailedArchives(opts) => run_clean_failed_archives(opts),
            Command::ListArchives(opts) => run_list_archives(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Creates a backup.
    #[command(override_usage = "xdxd-backup create [options] -i <inputDirectory>")]
    Create(CreateOptions),

    /// Removes failed archives and their logs from the output directory.
    #[command(override_usage = "xdxd-backup clean-failed-archives [options]")]
    CleanFailedArchives(CleanOptions),

    /// Lists found archives in the output directory.
    #[command(override_usage = "xdxd-backup list-archives [options]")]
    ListArchives(ListOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CreateOptions {
    /// Input directory.
    #[arg(short, long = "inputDirectory", value_name = "inputDirectory")]
    pub input_directory: PathBuf,

    /// Output directory (uses default from settings if not specified).
    #[arg(short, long = "outputDirectory", value_name = "outputDirectory")]
    pub output_directory: Option<PathBuf>,

    /// Backup ignore file path.
    #[arg(long = "ignoreFilePath", value_name = "ignoreFilePath")]
    pub ignore_file_path: Option<PathBuf>,

    /// Compression level from 0 (store) to 5 (best).
    #[arg(
        short,
        long = "compressionLevel",
        value_name = "compressionLevel",
        allow_hyphen_values = true
    )]
    pub compression_level: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CleanOptions {
    /// Output directory to clean (uses default from settings if not specified).
    #[arg(short, long = "outputDirectory", value_name = "outputDirectory")]
    pub output_directory: Option<PathBuf>,

    /// Show what would be deleted without actually deleting anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Output directory to search for archives (uses default from settings if not specified).
    #[arg(short, long = "outputDirectory", value_name = "outputDirectory")]
    pub output_directory: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_ansi(std::io::stdout().is_terminal())
        .with_writer(writer);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // INVARIANT: Only help and version output count as success.
            let code = if error.use_stderr() { 1 } else { 0 };
            let _ = error.print();
            exit(code);
        }
    };

    if let Err(error) = cli.run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run_create(opts: CreateOptions, verbose: bool) -> Result<()> {
    let input_dir = absolute(&opts.input_directory)?;
    match metadata(&input_dir) {
        Ok(stats) if stats.is_dir() => {}
        Ok(_) => bail!("Input directory {:?} is not a directory.", input_dir.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            bail!("Could not find input directory {:?}.", input_dir.display())
        }
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("Could not access input directory {:?}.", input_dir.display())))
        }
    }

    let compression_level = opts
        .compression_level
        .as_deref()
        .map(str::parse::<CompressionLevel>)
        .transpose()?;

    let settings = read_settings().into_settings();
    let compression_level = settings.resolve_compression_level(compression_level);
    let output_dir = resolve_output_directory(&settings, opts.output_directory)?;

    let exclusions = read_ignore_lines(&input_dir, opts.ignore_file_path.as_deref())?
        .map(translate)
        .unwrap_or_default();
    debug!("exclusions: {exclusions:?}");

    if !is_executable_in_path(RAR) {
        bail!("The {RAR:?} executable is not in PATH.");
    }

    let job = BackupJob::new(
        input_dir,
        output_dir,
        compression_level,
        exclusions,
        BackupTimestamp::now(),
    );

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} {elapsed_precise:.green}  {msg}",
    )?);
    bar.set_message(format!("Backing up {:?}", job.input_dir().display()));
    bar.enable_steady_tick(Duration::from_millis(100));

    let result = job.run(&ExecutionContext::new(verbose)).await;
    bar.finish_and_clear();

    match result {
        Ok(_) => Ok(()),
        Err(archive::Error::ArchiverFailed { log_path, exit_code }) => {
            debug!("archiver exit code: {exit_code:?}");
            info!("Archiver output was saved to {:?}.", log_path.display());
            bail!("{RAR} failed.")
        }
        Err(err) => Err(err.into()),
    }
}

fn run_clean_failed_archives(opts: CleanOptions) -> Result<()> {
    let settings = read_settings().into_settings();
    let store = ArchiveStore::open(resolve_output_directory(&settings, opts.output_directory)?)?;
    let inventory = store.inventory()?;

    match inventory.archive_file_names.len() {
        0 => info!("No archives found in {:?}.", store.path().display()),
        count => info!("Found {count} archive(s) in {:?}.", store.path().display()),
    }

    let candidates = plan_deletions(store.path(), &inventory);
    if candidates.is_empty() {
        info!("No failed archives or orphan log files found.");
        return Ok(());
    }

    execute_deletions(store.path(), &candidates, opts.dry_run);

    Ok(())
}

fn run_list_archives(opts: ListOptions) -> Result<()> {
    let settings = read_settings().into_settings();
    let store = ArchiveStore::open(resolve_output_directory(&settings, opts.output_directory)?)?;
    let archives = store.archives()?;

    if archives.is_empty() {
        info!("No archives found in {:?}.", store.path().display());
        return Ok(());
    }

    info!("Found {} archive(s) in {:?}:", archives.len(), store.path().display());
    for archive in archives {
        info!("  {archive}");
    }

    Ok(())
}

fn resolve_output_directory(settings: &Settings, flag: Option<PathBuf>) -> Result<PathBuf> {
    let from_flag = flag.is_some();
    let Some(path) = settings.resolve_output_directory(flag) else {
        bail!(
            "Output directory must be specified either via --outputDirectory option or in the settings file."
        );
    };

    if !from_flag {
        debug!("Using default output directory from settings: {:?}", path.display());
    }

    Ok(absolute(path)?)
}
