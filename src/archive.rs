// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup archive creation and upkeep.
//!
//! A backup is a single run of the rar archiver over the contents of an input
//! directory. Each run leaves two files in the output directory that share a
//! timestamped base name: the archive itself, and a log holding everything
//! the archiver printed while producing it. The log is what later tells a
//! complete archive apart from a failed one.
//!
//! # Layout
//!
//! - [`invocation`]: builds the archiver command line.
//! - [`exec`]: runs it through a shell while capturing its output.
//! - [`outcome`]: classifies finished runs by their logs.
//! - [`cleanup`]: removes debris of failed runs.

pub mod cleanup;
pub mod exec;
pub mod invocation;
pub mod outcome;

use crate::{
    archive::{
        exec::{Execute, RunOutcome},
        invocation::{rar_invocation, Invocation},
    },
    config::CompressionLevel,
    store::{BackupFileNames, BackupTimestamp},
};

use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Fully resolved backup run.
///
/// Timestamp is captured once at construction, so archive and log always
/// share the same base name no matter how long the run takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    input_dir: PathBuf,
    output_dir: PathBuf,
    compression_level: CompressionLevel,
    exclusions: Vec<String>,
    file_names: BackupFileNames,
}

impl BackupJob {
    /// Construct new backup job.
    ///
    /// Both directories are expected to be in absolute form already.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        compression_level: CompressionLevel,
        exclusions: Vec<String>,
        timestamp: BackupTimestamp,
    ) -> Self {
        let input_dir = input_dir.into();
        let file_names = BackupFileNames::new(&input_dir, timestamp);

        Self {
            input_dir,
            output_dir: output_dir.into(),
            compression_level,
            exclusions,
            file_names,
        }
    }

    pub fn input_dir(&self) -> &Path {
        self.input_dir.as_path()
    }

    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_path()
    }

    /// Path to archive produced by this job.
    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_names.archive)
    }

    /// Path to log capturing archiver output of this job.
    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_names.log)
    }

    /// Archiver invocation for this job.
    pub fn invocation(&self) -> Invocation {
        rar_invocation(
            &self.input_dir,
            self.archive_path(),
            self.compression_level,
            &self.exclusions,
        )
    }

    /// Run backup job through executor.
    ///
    /// Output directory is created along with any missing parents first.
    ///
    /// # Errors
    ///
    /// - Return [`Error::CreateOutputDir`] if output directory cannot be
    ///   created.
    /// - Return [`Error::Execute`] if archiver cannot be run at all.
    /// - Return [`Error::ArchiverFailed`] if archiver ran, but did not
    ///   succeed.
    #[instrument(skip(self, executor), level = "debug")]
    pub async fn run(&self, executor: &impl Execute) -> Result<RunOutcome> {
        create_dir_all(&self.output_dir).map_err(|err| Error::CreateOutputDir {
            source: err,
            path: self.output_dir.clone(),
        })?;

        let log_path = self.log_path();
        info!("Creating archive {:?}", self.archive_path().display());
        debug!("capturing archiver output in {:?}", log_path.display());

        let outcome = executor.run_logged(&self.invocation(), &log_path).await?;
        if !outcome.is_success() {
            return Err(Error::ArchiverFailed {
                log_path,
                exit_code: outcome.exit_code,
            });
        }

        info!("Archive created successfully.");
        Ok(outcome)
    }
}

/// Backup job error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Output directory cannot be created.
    #[error("Could not create output directory {:?}.", path.display())]
    CreateOutputDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Archiver could not be run.
    #[error(transparent)]
    Execute(#[from] exec::Error),

    /// Archiver ran, but reported failure.
    #[error("rar failed.")]
    ArchiverFailed {
        log_path: PathBuf,
        exit_code: Option<i32>,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
