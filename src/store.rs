// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archive store inspection.
//!
//! Backups are written into an output directory called the __archive store__.
//! Every backup run leaves behind two files in the archive store: the archive
//! itself, and a log file holding the transcript of the archiver.
//!
//! # Archive Store Layout
//!
//! Both files share the same stem built from the base name of the input
//! directory, and the local time at which the backup was started:
//!
//! ```text
//! <input-dir-name>-DD-MM-YYYY_HH-MM-SS.rar
//! <input-dir-name>-DD-MM-YYYY_HH-MM-SS.log
//! ```
//!
//! Only the top-level of the archive store is ever evaluated. Anything that
//! does not follow the naming convention above is left alone.

use crate::path::absolute;

use chrono::{Local, NaiveDateTime};
use regex::Regex;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{metadata, read_dir},
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::{debug, instrument, warn};

/// File extension of archives.
pub const ARCHIVE_EXTENSION: &str = "rar";

/// File extension of archiver transcripts.
pub const LOG_EXTENSION: &str = "log";

static ARCHIVE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-\d{2}-\d{2}-\d{4}_\d{2}-\d{2}-\d{2}\.rar$").expect("archive name regex")
});

static LOG_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-\d{2}-\d{2}-\d{4}_\d{2}-\d{2}-\d{2}\.log$").expect("log name regex")
});

/// Point in time a backup was started at.
///
/// Captured once per backup run, so the archive and its log always share the
/// same stem.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BackupTimestamp(NaiveDateTime);

impl BackupTimestamp {
    /// Capture current local time.
    pub fn now() -> Self {
        Self(Local::now().naive_local())
    }

    /// Construct timestamp from given local date and time.
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self(datetime)
    }
}

impl Display for BackupTimestamp {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.0.format("%d-%m-%Y_%H-%M-%S"))
    }
}

/// Archive and log file names of one backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFileNames {
    pub archive: String,
    pub log: String,
}

impl BackupFileNames {
    /// Construct file names for backup of input directory.
    ///
    /// Falls back to "backup" as the stem prefix if input directory has no
    /// base name, e.g., it is a file system root.
    pub fn new(input_dir: impl AsRef<Path>, timestamp: BackupTimestamp) -> Self {
        let base = input_dir
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "backup".into());

        Self {
            archive: format!("{base}-{timestamp}.{ARCHIVE_EXTENSION}"),
            log: format!("{base}-{timestamp}.{LOG_EXTENSION}"),
        }
    }
}

/// Check if file name follows archive naming convention.
pub fn is_archive_name(name: &str) -> bool {
    ARCHIVE_NAME.is_match(name)
}

/// Check if file name follows log naming convention.
pub fn is_log_name(name: &str) -> bool {
    LOG_NAME.is_match(name)
}

/// Expected log file name of an archive.
pub fn log_name_for(archive: &str) -> String {
    let stem = archive
        .strip_suffix(&format!(".{ARCHIVE_EXTENSION}"))
        .unwrap_or(archive);
    format!("{stem}.{LOG_EXTENSION}")
}

/// Expected archive file name of a log.
pub fn archive_name_for(log: &str) -> String {
    let stem = log.strip_suffix(&format!(".{LOG_EXTENSION}")).unwrap_or(log);
    format!("{stem}.{ARCHIVE_EXTENSION}")
}

/// Classified listing of the top-level of an archive store.
///
/// # Invariant
///
/// - Archive and log file names are disjoint.
/// - Both listings are sorted in ascending order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Inventory {
    pub archive_file_names: Vec<String>,
    pub log_file_names: Vec<String>,
}

impl Inventory {
    /// Classify file names into archives and logs.
    ///
    /// Names following neither naming convention are dropped.
    pub fn from_names(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut inventory = Self::default();
        for name in names.into_iter().map(Into::into) {
            if is_archive_name(&name) {
                inventory.archive_file_names.push(name);
            } else if is_log_name(&name) {
                inventory.log_file_names.push(name);
            }
        }

        inventory.archive_file_names.sort();
        inventory.log_file_names.sort();
        inventory
    }

    /// Check if log file name is part of the inventory.
    pub fn has_log(&self, name: &str) -> bool {
        self.log_file_names.binary_search_by(|log| log.as_str().cmp(name)).is_ok()
    }

    /// Check if archive file name is part of the inventory.
    pub fn has_archive(&self, name: &str) -> bool {
        self.archive_file_names
            .binary_search_by(|archive| archive.as_str().cmp(name))
            .is_ok()
    }
}

/// List archives and logs at the top-level of a directory.
///
/// Subdirectories are never descended into. Entries whose name is not valid
/// UTF-8 cannot follow the naming convention, and are skipped.
///
/// # Errors
///
/// - Return [`Error::ReadDir`] if directory cannot be listed.
#[instrument(skip(dir), level = "debug")]
pub fn list_output_files(dir: impl AsRef<Path>) -> Result<Inventory> {
    let dir = dir.as_ref();
    let read_error = |err: std::io::Error| Error::ReadDir {
        source: err,
        path: dir.to_path_buf(),
    };

    let mut names = Vec::new();
    for entry in read_dir(dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => debug!("skip non UTF-8 entry {name:?}"),
        }
    }

    Ok(Inventory::from_names(names))
}

/// Archive found in archive store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File name of archive.
    pub file_name: String,

    /// Size of archive in bytes, if it could be determined.
    pub size: Option<u64>,
}

impl Display for ArchiveEntry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self.size {
            Some(size) => write!(
                fmt,
                "{} ({:.2} MB)",
                self.file_name,
                size as f64 / (1024.0 * 1024.0)
            ),
            None => fmt.write_str(&self.file_name),
        }
    }
}

/// Output directory holding archives and their logs.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    path: PathBuf,
}

impl ArchiveStore {
    /// Open existing archive store.
    ///
    /// Path is resolved to absolute form.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Access`] if path cannot be accessed.
    /// - Return [`Error::NotADirectory`] if path is not a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = absolute(path.as_ref()).map_err(|err| Error::Access {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        let stats = metadata(&path).map_err(|err| Error::Access {
            source: err,
            path: path.clone(),
        })?;

        if !stats.is_dir() {
            return Err(Error::NotADirectory { path });
        }

        Ok(Self { path })
    }

    /// Absolute path to archive store.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Classified listing of archive store.
    ///
    /// # Errors
    ///
    /// - Return [`Error::ReadDir`] if archive store cannot be listed.
    pub fn inventory(&self) -> Result<Inventory> {
        list_output_files(&self.path)
    }

    /// List archives along with their sizes.
    ///
    /// # Errors
    ///
    /// - Return [`Error::ReadDir`] if archive store cannot be listed.
    pub fn archives(&self) -> Result<Vec<ArchiveEntry>> {
        let entries = self
            .inventory()?
            .archive_file_names
            .into_iter()
            .map(|file_name| {
                let size = match metadata(self.path.join(&file_name)) {
                    Ok(stats) => Some(stats.len()),
                    Err(err) => {
                        warn!("Could not get stats for {file_name:?}: {err}");
                        None
                    }
                };
                ArchiveEntry { file_name, size }
            })
            .collect();

        Ok(entries)
    }
}

/// Archive store error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Archive store cannot be accessed.
    #[error("Could not access output directory {:?}.", path.display())]
    Access {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Archive store path is not a directory.
    #[error("Output directory {:?} is not a directory.", path.display())]
    NotADirectory { path: PathBuf },

    /// Archive store cannot be listed.
    #[error("Could not read output directory {:?}.", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir, write};

    #[test]
    fn backup_file_names_share_stem() -> anyhow::Result<()> {
        let datetime = NaiveDate::from_ymd_opt(2024, 6, 5)
            .and_then(|date| date.and_hms_opt(4, 3, 9))
            .ok_or_else(|| anyhow::anyhow!("bad date"))?;
        let result = BackupFileNames::new("/home/blah/photos", BackupTimestamp::new(datetime));
        let expect = BackupFileNames {
            archive: "photos-05-06-2024_04-03-09.rar".into(),
            log: "photos-05-06-2024_04-03-09.log".into(),
        };
        assert_eq!(result, expect);
        assert!(is_archive_name(&result.archive));
        assert!(is_log_name(&result.log));
        Ok(())
    }

    #[test]
    fn pairing_names() {
        assert_eq!(log_name_for("a-15-06-2024_14-30-45.rar"), "a-15-06-2024_14-30-45.log");
        assert_eq!(archive_name_for("a-15-06-2024_14-30-45.log"), "a-15-06-2024_14-30-45.rar");
    }

    #[test]
    fn inventory_classifies_and_sorts() {
        let result = Inventory::from_names([
            "zeta-16-06-2024_09-15-30.rar",
            "notarchive.txt",
            "alpha-15-06-2024_14-30-45.log",
            "alpha-15-06-2024_14-30-45.rar",
            "alpha.rar",
            "alpha-15-06-2024_14-30-45.rar.bak",
            "zeta-16-06-2024_09-15-30.log",
        ]);
        let expect = Inventory {
            archive_file_names: vec![
                "alpha-15-06-2024_14-30-45.rar".into(),
                "zeta-16-06-2024_09-15-30.rar".into(),
            ],
            log_file_names: vec![
                "alpha-15-06-2024_14-30-45.log".into(),
                "zeta-16-06-2024_09-15-30.log".into(),
            ],
        };
        assert_eq!(result, expect);
        assert!(result.has_log("zeta-16-06-2024_09-15-30.log"));
        assert!(!result.has_archive("alpha.rar"));
    }

    #[test]
    fn list_output_files_is_not_recursive() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path().join("input-15-06-2024_14-30-45.rar"), "archive")?;
        write(dir.path().join("input-15-06-2024_14-30-45.log"), "Done")?;
        write(dir.path().join("notes.txt"), "hello")?;
        create_dir(dir.path().join("nested"))?;
        write(dir.path().join("nested").join("deep-15-06-2024_14-30-45.rar"), "")?;

        let result = list_output_files(dir.path())?;
        assert_eq!(result.archive_file_names, vec!["input-15-06-2024_14-30-45.rar"]);
        assert_eq!(result.log_file_names, vec!["input-15-06-2024_14-30-45.log"]);

        Ok(())
    }

    #[test]
    fn list_output_files_missing_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = list_output_files(dir.path().join("missing"));
        assert!(matches!(result, Err(Error::ReadDir { .. })));
        Ok(())
    }

    #[test]
    fn open_store_rejects_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("file.txt");
        write(&file, "")?;

        assert!(matches!(ArchiveStore::open(&file), Err(Error::NotADirectory { .. })));
        assert!(matches!(
            ArchiveStore::open(dir.path().join("missing")),
            Err(Error::Access { .. })
        ));

        Ok(())
    }

    #[test]
    fn store_lists_archive_sizes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write(dir.path().join("a-15-06-2024_14-30-45.rar"), vec![0u8; 1024 * 1024])?;
        write(dir.path().join("b-15-06-2024_14-30-45.rar"), "")?;

        let store = ArchiveStore::open(dir.path())?;
        let result = store
            .archives()?
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let expect = vec![
            "a-15-06-2024_14-30-45.rar (1.00 MB)".to_string(),
            "b-15-06-2024_14-30-45.rar (0.00 MB)".to_string(),
        ];
        assert_eq!(result, expect);

        Ok(())
    }
}
