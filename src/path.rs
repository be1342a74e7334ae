// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, e.g., the user's settings file, or directories passed in
//! from the command line.

use std::{
    io,
    path::{Path, PathBuf},
};

/// Name of the settings file stored at the top-level of the home directory.
pub const SETTINGS_FILE_NAME: &str = "xdxd-backup.json";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf, NoWayHome> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine absolute path to settings file inside of a home directory.
///
/// Does not check if the path returned actually exists.
pub fn settings_file_path(home: impl AsRef<Path>) -> PathBuf {
    home.as_ref().join(SETTINGS_FILE_NAME)
}

/// Resolve path to absolute form relative to current working directory.
///
/// Path is not required to exist, and symlinks are left untouched.
///
/// # Errors
///
/// - Return [`io::Error`] if current working directory cannot be determined.
pub fn absolute(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    std::path::absolute(path.as_ref())
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn settings_file_lives_at_top_of_home() {
        let result = settings_file_path("/home/blah");
        assert_eq!(result, PathBuf::from("/home/blah/xdxd-backup.json"));
    }

    #[test]
    fn absolute_keeps_absolute_paths() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(absolute(dir.path())?, dir.path());
        assert!(absolute("relative/dir")?.is_absolute());
        Ok(())
    }
}
