// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Timestamped rar backups of a directory tree.
//!
//! Each backup is produced by running the external rar archiver over the
//! contents of an input directory. The archiver's full transcript is captured
//! into a log file stored next to the archive, and that log later decides
//! whether the archive can be trusted. Paths to leave out of a backup are
//! described with gitignore-style rules stored in a ".backupignore" file.
//!
//! # Naming Convention
//!
//! Archives and logs live in an output directory, and are named after the
//! input directory plus the local time the backup was started at:
//!
//! ```text
//! photos-15-06-2024_14-30-45.rar
//! photos-15-06-2024_14-30-45.log
//! ```
//!
//! Listing and cleanup only ever consider files following this convention.

pub mod archive;
pub mod backup_ignore;
pub mod config;
pub mod path;
pub mod store;
pub mod tail;

pub use archive::{
    exec::{ExecutionContext, RunOutcome},
    BackupJob,
};
pub use config::{CompressionLevel, Settings, SettingsLoad};
pub use store::{ArchiveStore, BackupTimestamp};
