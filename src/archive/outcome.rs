// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archive outcome classification.
//!
//! The rar archiver ends a successful run by printing "Done" on a line of its
//! own. A log whose tail lacks that marker belongs to an archive run that was
//! interrupted or failed, and whose archive cannot be trusted.

use crate::tail::read_last_lines;

use std::{io, path::Path};

/// Amount of non-blank lines at the end of a log searched for the marker.
pub const TAIL_LINES: usize = 5;

/// Line marking successful completion of an archive run.
pub const SUCCESS_MARKER: &str = "done";

/// Outcome of an archive run according to its log.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    /// Success marker found in tail of log.
    Complete,

    /// Success marker missing from tail of log.
    Incomplete,
}

/// Check if a single line is the success marker.
///
/// Surrounding whitespace and letter case are ignored.
pub fn is_success_marker(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(SUCCESS_MARKER)
}

/// Classify lines taken from the tail of a log.
pub fn classify_lines(lines: impl IntoIterator<Item = impl AsRef<str>>) -> LogOutcome {
    if lines.into_iter().any(|line| is_success_marker(line.as_ref())) {
        LogOutcome::Complete
    } else {
        LogOutcome::Incomplete
    }
}

/// Classify log file at target path.
///
/// An empty log is always incomplete.
///
/// # Errors
///
/// - Return [`io::Error`] if log cannot be opened or read. Unreadable logs
///   are distinct from incomplete ones.
pub fn classify_log(path: impl AsRef<Path>) -> io::Result<LogOutcome> {
    read_last_lines(path, TAIL_LINES).map(classify_lines)
}

/// Check if log file at target path belongs to a successful archive run.
///
/// # Errors
///
/// - Return [`io::Error`] if log cannot be opened or read.
pub fn is_log_complete(path: impl AsRef<Path>) -> io::Result<bool> {
    classify_log(path).map(|outcome| outcome == LogOutcome::Complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs::write;

    #[test_case("Done"; "capitalized")]
    #[test_case("DONE"; "upper case")]
    #[test_case("  done  "; "padded")]
    #[test_case("\tdone\r"; "tabs and carriage return")]
    #[test]
    fn success_marker_variants(line: &str) {
        assert!(is_success_marker(line));
    }

    #[test_case("Done."; "trailing period")]
    #[test_case("All done"; "embedded")]
    #[test_case("d o n e"; "spaced")]
    #[test]
    fn success_marker_must_be_whole_line(line: &str) {
        assert!(!is_success_marker(line));
    }

    #[test]
    fn complete_log() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ok.log");
        write(
            &path,
            "Creating archive\r\nAdding file1.txt\r\nAdding file2.txt\r\nCompressing files\r\nOperation completed\r\nDone",
        )?;
        assert_eq!(classify_log(&path)?, LogOutcome::Complete);
        assert!(is_log_complete(&path)?);
        Ok(())
    }

    #[test]
    fn marker_outside_tail_is_incomplete() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("failed.log");
        write(
            &path,
            "Done\nAdding file1.txt\nInitial setup complete\nAdding file2.txt\nError: disk full\nProcess terminated\nCleanup failed\n",
        )?;
        assert_eq!(classify_log(&path)?, LogOutcome::Incomplete);
        Ok(())
    }

    #[test]
    fn marker_followed_by_blank_lines() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("trailing.log");
        write(&path, "a\nb\nc\nd\ne\nDone\n\n\n\n\n\n\n")?;
        assert!(is_log_complete(&path)?);
        Ok(())
    }

    #[test]
    fn empty_log_is_incomplete() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty.log");
        write(&path, "")?;
        assert_eq!(classify_log(&path)?, LogOutcome::Incomplete);
        Ok(())
    }

    #[test]
    fn unreadable_log_is_an_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(classify_log(dir.path().join("missing.log")).is_err());
        Ok(())
    }
}
