// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Failed archive cleanup.
//!
//! Interrupted or failed backup runs leave debris behind in the archive store:
//! archives without a log, archives whose log lacks the success marker, and
//! logs whose archive never made it to disk. Cleanup happens in two steps.
//! First the inventory is turned into a list of [`DeletionCandidate`]s without
//! touching anything. Then each candidate is deleted on its own, or merely
//! reported when doing a dry run.
//!
//! # Pairing Rules
//!
//! - Archive without log: archive is deleted.
//! - Archive whose log cannot be read: archive and log are deleted.
//! - Archive whose log lacks the success marker: archive and log are deleted.
//! - Log without archive: log is deleted.

use crate::{
    archive::outcome::{classify_log, LogOutcome},
    store::{archive_name_for, log_name_for, Inventory},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::remove_file,
    path::Path,
};
use tracing::{debug, info, instrument, warn};

/// Kind of file in the archive store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FileKind {
    Archive,
    Log,
}

impl Display for FileKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Archive => fmt.write_str("archive"),
            Self::Log => fmt.write_str("log"),
        }
    }
}

/// Why a file should be deleted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeletionReason {
    /// Archive has no log.
    NoLogFound,

    /// Log has no archive.
    NoArchiveFound,

    /// Log lacks success marker.
    IncompleteLog,

    /// Log could not be read.
    CouldNotReadLog,
}

impl Display for DeletionReason {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::NoLogFound => fmt.write_str("No corresponding log file found"),
            Self::NoArchiveFound => fmt.write_str("No corresponding archive file found"),
            Self::IncompleteLog => fmt.write_str("No \"Done\" found in last 5 lines of log"),
            Self::CouldNotReadLog => fmt.write_str("Could not read corresponding log file"),
        }
    }
}

/// File proposed for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionCandidate {
    /// File name relative to archive store.
    pub file_name: String,

    /// Kind of file.
    pub kind: FileKind,

    /// Why file should be deleted.
    pub reason: DeletionReason,

    /// Additional context for reason, e.g., an I/O error.
    pub detail: Option<String>,
}

impl DeletionCandidate {
    /// Construct new deletion candidate without detail.
    pub fn new(file_name: impl Into<String>, kind: FileKind, reason: DeletionReason) -> Self {
        Self {
            file_name: file_name.into(),
            kind,
            reason,
            detail: None,
        }
    }

    /// Attach detail to deletion candidate.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Human readable reason, suffixed with detail if available.
    pub fn message(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}: {detail}", self.reason),
            None => self.reason.to_string(),
        }
    }
}

/// Determine which files of the archive store need to be deleted.
///
/// Candidates for archives come first in inventory order, each immediately
/// followed by the candidate of its log when both are deleted. Candidates
/// for orphaned logs come last, also in inventory order.
#[instrument(skip(output_dir, inventory), level = "debug")]
pub fn plan_deletions(output_dir: impl AsRef<Path>, inventory: &Inventory) -> Vec<DeletionCandidate> {
    let mut candidates = Vec::new();

    for archive in &inventory.archive_file_names {
        let log = log_name_for(archive);
        if !inventory.has_log(&log) {
            info!("No log file found for archive {archive:?} - marking as failed.");
            candidates.push(DeletionCandidate::new(
                archive,
                FileKind::Archive,
                DeletionReason::NoLogFound,
            ));
            continue;
        }

        match classify_log(output_dir.as_ref().join(&log)) {
            Ok(LogOutcome::Complete) => {
                debug!("archive {archive:?} completed successfully");
            }
            Ok(LogOutcome::Incomplete) => {
                info!("Archive {archive:?} appears to have failed - no \"Done\" found in last 5 lines of log.");
                let reason = DeletionReason::IncompleteLog;
                candidates.push(DeletionCandidate::new(archive, FileKind::Archive, reason));
                candidates.push(DeletionCandidate::new(log, FileKind::Log, reason));
            }
            Err(err) => {
                warn!("Could not read log file {log:?} for archive {archive:?} - marking as failed: {err}");
                let reason = DeletionReason::CouldNotReadLog;
                let detail = err.to_string();
                candidates.push(
                    DeletionCandidate::new(archive, FileKind::Archive, reason)
                        .with_detail(detail.clone()),
                );
                candidates.push(DeletionCandidate::new(log, FileKind::Log, reason).with_detail(detail));
            }
        }
    }

    for log in &inventory.log_file_names {
        if !inventory.has_archive(&archive_name_for(log)) {
            info!("No archive found for log file {log:?} - marking as orphan.");
            candidates.push(DeletionCandidate::new(
                log,
                FileKind::Log,
                DeletionReason::NoArchiveFound,
            ));
        }
    }

    candidates
}

/// Tally of a cleanup run.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DeletionSummary {
    /// Archives deleted, or that would have been deleted.
    pub deleted_archive_count: usize,

    /// Logs deleted, or that would have been deleted.
    pub deleted_log_count: usize,

    /// Nothing was actually deleted.
    pub dry_run: bool,
}

impl DeletionSummary {
    fn count(&mut self, kind: FileKind) {
        match kind {
            FileKind::Archive => self.deleted_archive_count += 1,
            FileKind::Log => self.deleted_log_count += 1,
        }
    }
}

impl Display for DeletionSummary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let verb = if self.dry_run {
            "would have been"
        } else {
            "were"
        };
        write!(
            fmt,
            "{} archive(s) and {} log file(s) {verb} deleted.",
            self.deleted_archive_count, self.deleted_log_count
        )
    }
}

/// Delete candidates from the archive store.
///
/// Each candidate is deleted on its own. Failure to delete one candidate is
/// reported as a warning, left out of the summary, and does not stop the
/// remaining candidates from being deleted. In dry run mode nothing is
/// deleted, and the summary tells what would have been deleted.
///
/// Produces no output at all when there is nothing to delete.
#[instrument(skip(output_dir, candidates), level = "debug")]
pub fn execute_deletions(
    output_dir: impl AsRef<Path>,
    candidates: &[DeletionCandidate],
    dry_run: bool,
) -> DeletionSummary {
    let mut summary = DeletionSummary {
        dry_run,
        ..DeletionSummary::default()
    };

    if candidates.is_empty() {
        return summary;
    }

    let failed_archives = candidates
        .iter()
        .filter(|candidate| candidate.kind == FileKind::Archive)
        .count();
    let orphan_logs = candidates
        .iter()
        .filter(|candidate| candidate.reason == DeletionReason::NoArchiveFound)
        .count();

    if failed_archives > 0 {
        info!("Found {failed_archives} failed archive(s).");
    }

    if orphan_logs > 0 {
        info!("Found {orphan_logs} orphan log file(s).");
    }

    if dry_run {
        info!("Dry run mode - showing what would be deleted:");
        for candidate in candidates {
            info!(
                "* Would delete {} {:?} - {}.",
                candidate.kind,
                candidate.file_name,
                candidate.message()
            );
            summary.count(candidate.kind);
        }
        info!("{summary}");
        return summary;
    }

    for candidate in candidates {
        match remove_file(output_dir.as_ref().join(&candidate.file_name)) {
            Ok(()) => {
                info!(
                    "* Deleted {} {:?} - {}.",
                    candidate.kind,
                    candidate.file_name,
                    candidate.message()
                );
                summary.count(candidate.kind);
            }
            Err(err) => {
                warn!(
                    "Could not delete {} {:?}: {err}",
                    candidate.kind, candidate.file_name
                );
            }
        }
    }

    info!("{summary}");
    summary
}
