// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Read the tail end of potentially huge text files.
//!
//! Archiver transcripts can grow large for big input directories, but only
//! the last few lines are ever of interest. Files are read backwards in
//! fixed-size chunks until enough lines have been collected, so memory use is
//! bounded by the distance from the end of the file to the wanted lines rather
//! than by the size of the file itself.

use std::{
    fs::File,
    io::{Read, Result, Seek, SeekFrom},
    path::Path,
};

/// Default amount of bytes read per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Backwards line reader.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TailReader {
    chunk_size: usize,
}

impl Default for TailReader {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TailReader {
    /// Construct new tail reader with given chunk size.
    ///
    /// Chunk size is clamped to at least one byte.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Read last non-blank lines of a file.
    ///
    /// Lines may be terminated by either "\n" or "\r\n", and terminators are
    /// not part of the returned lines. Blank lines are skipped entirely. At
    /// most `min_lines` lines are returned, fewer if the file does not have
    /// that many. Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// - Return [`std::io::Error`] if file cannot be opened or read.
    pub fn read_last_lines(&self, path: impl AsRef<Path>, min_lines: usize) -> Result<Vec<String>> {
        let mut file = File::open(path.as_ref())?;
        let size = file.metadata()?.len();
        if size == 0 {
            return Ok(Vec::new());
        }

        let mut position = size;
        let mut accumulated: Vec<u8> = Vec::new();
        let mut lines = Vec::new();

        while position > 0 {
            let read_size = (self.chunk_size as u64).min(position);
            position -= read_size;

            let mut chunk = vec![0u8; read_size as usize];
            file.seek(SeekFrom::Start(position))?;
            file.read_exact(&mut chunk)?;
            chunk.extend_from_slice(&accumulated);
            accumulated = chunk;

            lines = whole_lines(&accumulated, position == 0);
            if lines.len() >= min_lines {
                break;
            }
        }

        let skip = lines.len().saturating_sub(min_lines);
        Ok(lines.split_off(skip))
    }
}

/// Read last non-blank lines of a file with default chunk size.
///
/// # Errors
///
/// - Return [`std::io::Error`] if file cannot be opened or read.
pub fn read_last_lines(path: impl AsRef<Path>, min_lines: usize) -> Result<Vec<String>> {
    TailReader::default().read_last_lines(path, min_lines)
}

fn whole_lines(bytes: &[u8], at_file_start: bool) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut segments = text.split('\n');

    // INVARIANT: Leading segment may be cut off mid-line unless we hit the start of the file.
    if !at_file_start {
        segments.next();
    }

    segments
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}
