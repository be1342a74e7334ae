// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archiver invocation building.

use crate::{archive::exec::Shell, config::CompressionLevel};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, MAIN_SEPARATOR},
};

/// Name of the archiver executable.
pub const RAR: &str = "rar";

/// Program plus arguments to hand to a shell.
///
/// Arguments are literal values. They only get quoted when rendered into a
/// command line for a specific [`Shell`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Construct new invocation.
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Full command line for the shell of the current platform.
    pub fn command_line(&self) -> String {
        Shell::default().command_line(self)
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.command_line().as_str())
    }
}

/// Build rar invocation that adds contents of input directory to an archive.
///
/// Argument order is: add mode, recurse subdirectories, do not store the
/// input directory itself in archived names, compression level, exclusion
/// switches, destination archive, and finally everything inside of the input
/// directory.
pub fn rar_invocation(
    input_dir: impl AsRef<Path>,
    archive_path: impl AsRef<Path>,
    compression_level: CompressionLevel,
    exclusions: &[String],
) -> Invocation {
    let mut args = vec![
        "a".to_string(),
        "-r".to_string(),
        "-ep1".to_string(),
        format!("-m{compression_level}"),
    ];
    args.extend(exclusions.iter().map(|switch| unquote_switch(switch)));
    args.push(archive_path.as_ref().to_string_lossy().into_owned());
    args.push(format!("{}{MAIN_SEPARATOR}*", input_dir.as_ref().display()));

    Invocation::new(RAR, args)
}

/// Strip one pair of double quotes around the value of an exclusion switch.
///
/// Exclusion switches arrive as `-x"pattern"`. The quotes are shell syntax, so
/// rar itself must see `-xpattern`.
fn unquote_switch(switch: &str) -> String {
    switch
        .strip_prefix("-x\"")
        .and_then(|pattern| pattern.strip_suffix('"'))
        .map(|pattern| format!("-x{pattern}"))
        .unwrap_or_else(|| switch.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup_ignore::translate;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn rar_invocation_argument_order() -> anyhow::Result<()> {
        let input = PathBuf::from("/data/photos");
        let archive = PathBuf::from("/backups/photos-15-06-2024_14-30-45.rar");
        let exclusions = translate(["*.tmp", "cache/"]);

        let result = rar_invocation(&input, &archive, CompressionLevel::new(3)?, &exclusions);
        let expect = vec![
            "a".to_string(),
            "-r".into(),
            "-ep1".into(),
            "-m3".into(),
            "-x*.tmp".into(),
            "-xcache/*".into(),
            archive.display().to_string(),
            format!("{}{MAIN_SEPARATOR}*", input.display()),
        ];

        assert_eq!(result.program, RAR);
        assert_eq!(result.args, expect);

        Ok(())
    }

    #[test]
    fn rar_invocation_keeps_paths_literal() -> anyhow::Result<()> {
        let input = PathBuf::from("/data/pho$tos `album`");
        let archive = PathBuf::from("/data/b$kups/pho$tos `album`-15-06-2024_14-30-45.rar");

        let result = rar_invocation(&input, &archive, CompressionLevel::new(0)?, &[]);
        assert_eq!(
            result.args[4..].to_vec(),
            vec![
                "/data/b$kups/pho$tos `album`-15-06-2024_14-30-45.rar".to_string(),
                format!("/data/pho$tos `album`{MAIN_SEPARATOR}*"),
            ]
        );

        Ok(())
    }

    #[test]
    fn unquote_switch_strips_one_pair() {
        assert_eq!(unquote_switch("-x\"*.log\""), "-x*.log");
        assert_eq!(unquote_switch("-x\"say \"hi\"\""), "-xsay \"hi\"");
        assert_eq!(unquote_switch("-x*.log"), "-x*.log");
        assert_eq!(unquote_switch("-x\""), "-x\"");
        assert_eq!(unquote_switch("-m3"), "-m3");
    }

    #[cfg(unix)]
    #[test]
    fn command_line_quotes_for_shell() {
        let invocation = Invocation::new("rar", ["a", "-x*.log", "/b$kups/out.rar"]);
        assert_eq!(invocation.to_string(), "rar a '-x*.log' '/b$kups/out.rar'");
    }
}
