// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup ignore rule handling.
//!
//! Users can keep a gitignore-style listing of patterns that should be left
//! out of a backup. By default this listing is read from a ".backupignore"
//! file at the top-level of the input directory, but an explicit file can be
//! given instead.
//!
//! # Translation
//!
//! The rar archiver knows nothing about gitignore syntax. It only understands
//! exclusion switches of the form `-x"<wildcard>"`. Thus, each ignore rule is
//! translated into at most one exclusion switch:
//!
//! | Rule                        | Exclusion      |
//! |-----------------------------|----------------|
//! | `# comment`, blank line     | _none_         |
//! | `/build/`, `build/`         | `-x"build/*"`  |
//! | `!keep.txt`                 | _none_         |
//! | `*.log`, `file?.txt`        | as-is          |
//! | `node_modules`              | `-x"*node_modules*"` |
//! | `dir1/file2.txt`            | as-is          |
//!
//! Path separators are rewritten to the host's native separator. Negation is
//! not supported by rar, so negated rules are dropped. Anything beyond the
//! rules above (character classes, `**` semantics, anchoring) is left to
//! whatever rar makes of the resulting wildcard.

use crate::path::absolute;

use std::{
    fs::read,
    io::ErrorKind,
    path::{Path, PathBuf, MAIN_SEPARATOR},
};
use tracing::{info, instrument};

/// Name of implicit ignore file inside of input directory.
pub const BACKUP_IGNORE_FILE_NAME: &str = ".backupignore";

/// Translate listing of ignore rules into rar exclusion switches.
///
/// Relative order of rules is preserved. Rules that translate to nothing are
/// dropped.
pub fn translate(lines: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    lines
        .into_iter()
        .filter_map(|line| to_exclusion(line.as_ref()))
        .collect()
}

fn to_exclusion(line: &str) -> Option<String> {
    let pattern = strip_comment(line).trim();
    let pattern = pattern.strip_prefix('/').unwrap_or(pattern);
    if pattern.is_empty() {
        return None;
    }

    let wildcard = if pattern.ends_with('/') {
        format!("{pattern}*")
    } else if pattern.starts_with('!') {
        return None;
    } else if pattern.contains(['*', '?']) || pattern.contains('/') {
        pattern.to_owned()
    } else {
        format!("*{pattern}*")
    };

    let wildcard = if MAIN_SEPARATOR == '/' {
        wildcard
    } else {
        wildcard.replace('/', MAIN_SEPARATOR.to_string().as_str())
    };

    Some(format!("-x\"{wildcard}\""))
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(rule, _)| rule)
}

/// Read raw ignore rules for an input directory.
///
/// An explicit ignore file must exist. Without one, ".backupignore" is looked
/// up at the top-level of the input directory, and its absence simply means
/// that there are no rules to read. Lines are returned untouched, comments and
/// all.
///
/// # Errors
///
/// - Return [`Error::NotFound`] if explicit ignore file does not exist.
/// - Return [`Error::Read`] if ignore file cannot be read.
#[instrument(skip(input_dir, explicit), level = "debug")]
pub fn read_ignore_lines(
    input_dir: impl AsRef<Path>,
    explicit: Option<&Path>,
) -> Result<Option<Vec<String>>> {
    if let Some(explicit) = explicit {
        let path = absolute(explicit).map_err(|err| Error::Read {
            source: err,
            path: explicit.to_path_buf(),
        })?;

        return match read_lines(&path) {
            Err(Error::Read { source, path }) if source.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound { path })
            }
            result => {
                info!("Using backup ignore file: {:?}", path.display());
                result.map(Some)
            }
        };
    }

    let path = input_dir.as_ref().join(BACKUP_IGNORE_FILE_NAME);
    match read_lines(&path) {
        Err(Error::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
            info!("No backup ignore file found.");
            Ok(None)
        }
        result => {
            info!("Using backup ignore file: {:?}", path.display());
            result.map(Some)
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = read(path).map_err(|err| Error::Read {
        source: err,
        path: path.to_path_buf(),
    })?;

    Ok(String::from_utf8_lossy(&content)
        .lines()
        .map(str::to_owned)
        .collect())
}

/// Backup ignore file error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Explicitly given ignore file does not exist.
    #[error("Could not find backup ignore file {:?}.", path.display())]
    NotFound { path: PathBuf },

    /// Ignore file exists, but cannot be read.
    #[error("Could not read backup ignore file {:?}.", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
