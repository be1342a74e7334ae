// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process execution.
//!
//! The archiver is run through the platform shell, and its entire transcript
//! is captured into a log file next to the archive it produces. Standard
//! output and standard error are read concurrently, one task per stream.
//! Both tasks hand complete lines to a single writer task that owns the log
//! file, so lines from either stream never tear into each other. The log
//! file is only closed once both streams have been drained.

use crate::archive::invocation::Invocation;

use std::{
    borrow::Cow,
    future::Future,
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, BufWriter},
    process::Command,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, info, instrument};

/// Native line terminator used for log files.
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";

/// Native line terminator used for log files.
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// Shell used to run invocations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shell {
    /// POSIX shell through `sh -c`.
    Sh,

    /// Windows PowerShell through `powershell -Command`.
    PowerShell,
}

impl Default for Shell {
    fn default() -> Self {
        if cfg!(windows) {
            Self::PowerShell
        } else {
            Self::Sh
        }
    }
}

impl Shell {
    /// Quote argument so the shell hands it to the program unchanged.
    ///
    /// Arguments made of plain characters are left alone. Everything else is
    /// wrapped in single quotes, the only quoting both shells never expand.
    pub fn quote<'a>(&self, arg: &'a str) -> Cow<'a, str> {
        let plain = match self {
            Self::Sh => "_@%+=:,./-",
            Self::PowerShell => "_./\\:-",
        };
        if !arg.is_empty() && arg.chars().all(|c| c.is_ascii_alphanumeric() || plain.contains(c)) {
            return Cow::Borrowed(arg);
        }

        let mut quoted = String::with_capacity(arg.len() + 2);
        quoted.push('\'');
        for c in arg.chars() {
            match (self, c) {
                (Self::Sh, '\'') => quoted.push_str("'\\''"),
                // INVARIANT: PowerShell treats typographic single quotes as quotes too.
                (Self::PowerShell, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') => {
                    quoted.push(c);
                    quoted.push(c);
                }
                _ => quoted.push(c),
            }
        }
        quoted.push('\'');
        Cow::Owned(quoted)
    }

    /// Render invocation as a command line for this shell.
    pub fn command_line(&self, invocation: &Invocation) -> String {
        let program = self.quote(&invocation.program);
        // INVARIANT: PowerShell only runs a quoted program through the call operator.
        let mut line = if *self == Self::PowerShell && matches!(program, Cow::Owned(_)) {
            format!("& {program}")
        } else {
            program.into_owned()
        };
        for arg in &invocation.args {
            line.push(' ');
            line.push_str(&self.quote(arg));
        }
        line
    }

    fn command(&self, line: &str) -> Command {
        let mut command = match self {
            Self::Sh => Command::new("sh"),
            Self::PowerShell => {
                let mut command = Command::new("powershell");
                command.args(["-NoProfile", "-NonInteractive"]);
                command
            }
        };

        match self {
            Self::Sh => command.arg("-c"),
            Self::PowerShell => command.arg("-Command"),
        };
        command.arg(line);
        command
    }
}

/// Explicit context for spawning external processes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Shell that interprets the command line.
    pub shell: Shell,

    /// Working directory of spawned process, inherited if absent.
    pub working_directory: Option<PathBuf>,

    /// Echo command lines before running them.
    pub verbose: bool,
}

impl ExecutionContext {
    /// Construct new execution context for current platform.
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }
}

/// How an external process ended.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code, absent if process was killed by a signal.
    pub exit_code: Option<i32>,

    /// Process wrote at least one non-blank line to standard error.
    pub stderr_seen: bool,
}

impl RunOutcome {
    /// Check if the run counts as successful.
    ///
    /// Requires an exit code of zero. On Windows the archiver may report
    /// failures on standard error while still exiting with zero, so any
    /// standard error output counts as failure there.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0) && !(cfg!(windows) && self.stderr_seen)
    }
}

/// Run invocations while capturing their output into a log file.
pub trait Execute {
    /// Run invocation to completion, appending its output to log file.
    fn run_logged(
        &self,
        invocation: &Invocation,
        log_path: &Path,
    ) -> impl Future<Output = Result<RunOutcome>>;
}

impl Execute for ExecutionContext {
    #[instrument(skip(self, invocation, log_path), level = "debug")]
    async fn run_logged(&self, invocation: &Invocation, log_path: &Path) -> Result<RunOutcome> {
        let line = self.shell.command_line(invocation);
        if self.verbose {
            info!("$ {line}");
        } else {
            debug!("$ {line}");
        }

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .await
            .map_err(|err| Error::OpenLog {
                source: err,
                path: log_path.to_path_buf(),
            })?;

        let mut command = self.shell.command(&line);
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let spawn_error = |err| Error::Spawn {
            source: err,
            program: invocation.program.clone(),
        };
        let mut child = command.spawn().map_err(spawn_error)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(io::Error::other("stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error(io::Error::other("stderr not captured")))?;

        // INVARIANT: Writer owns the log file, and outlives both readers.
        let (sender, receiver) = unbounded_channel();
        let writer = tokio::spawn(write_lines(log, receiver));
        let stdout_reader = tokio::spawn(forward_lines(stdout, sender.clone()));
        let stderr_reader = tokio::spawn(forward_lines(stderr, sender));

        let status = child.wait().await;
        if status.is_err() {
            let _ = child.start_kill();
        }

        finish_capture(
            status,
            [stdout_reader, stderr_reader],
            writer,
            &invocation.program,
            log_path,
        )
        .await
    }
}

/// Drain both stream readers and the log writer, then report how the run went.
///
/// The log is always flushed before any error is reported, including a failed
/// wait on the process.
async fn finish_capture(
    status: io::Result<ExitStatus>,
    [stdout_reader, stderr_reader]: [JoinHandle<io::Result<bool>>; 2],
    writer: JoinHandle<io::Result<()>>,
    program: &str,
    log_path: &Path,
) -> Result<RunOutcome> {
    let stdout = stdout_reader.await;
    let stderr = stderr_reader.await;
    let written = writer.await;

    let status = status.map_err(|err| Error::Spawn {
        source: err,
        program: program.to_owned(),
    })?;
    let capture_error = |err| Error::Capture {
        source: err,
        program: program.to_owned(),
    };
    stdout?.map_err(capture_error)?;
    let stderr_seen = stderr?.map_err(capture_error)?;
    written?.map_err(|err| Error::WriteLog {
        source: err,
        path: log_path.to_path_buf(),
    })?;

    debug!("{program:?} exited with {status}");
    Ok(RunOutcome {
        exit_code: status.code(),
        stderr_seen,
    })
}

/// Forward lines of a stream to the log writer.
///
/// Returns whether any non-blank line was seen.
async fn forward_lines<S>(stream: S, sender: UnboundedSender<String>) -> io::Result<bool>
where
    S: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(stream).split(b'\n');
    let mut seen = false;

    while let Some(segment) = segments.next_segment().await? {
        let line = String::from_utf8_lossy(&segment);
        let line = line.strip_suffix('\r').unwrap_or(&line).to_owned();
        seen |= !line.trim().is_empty();

        // INVARIANT: Keep draining the stream even if the writer has given up.
        let _ = sender.send(line);
    }

    Ok(seen)
}

async fn write_lines(file: File, mut receiver: UnboundedReceiver<String>) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    while let Some(line) = receiver.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(LINE_ENDING.as_bytes()).await?;
    }
    writer.flush().await?;
    writer.into_inner().sync_all().await?;

    Ok(())
}

/// Check if an executable can be found through `PATH`.
pub fn is_executable_in_path(name: &str) -> bool {
    !name.trim().is_empty() && which::which(name).is_ok()
}

/// Process execution error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Process cannot be spawned or waited on.
    #[error("failed to run {program:?}")]
    Spawn {
        #[source]
        source: io::Error,
        program: String,
    },

    /// Output of process cannot be read.
    #[error("failed to capture output of {program:?}")]
    Capture {
        #[source]
        source: io::Error,
        program: String,
    },

    /// Log file cannot be opened for appending.
    #[error("failed to open log file {:?}", path.display())]
    OpenLog {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Log file cannot be written to.
    #[error("failed to write log file {:?}", path.display())]
    WriteLog {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Reader or writer task died.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
