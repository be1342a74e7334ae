// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout and resolution.
//!
//! Backups are driven by a small JSON settings file stored at the
//! top-level of the user's home directory named "xdxd-backup.json". The file
//! only ever supplies __defaults__ for options that were not given on the
//! command line. The settings file is never written by this tool.
//!
//! # General Layout
//!
//! ```json
//! { "defaults": { "outputDirectory": "~/backups", "compressionLevel": 3 } }
//! ```
//!
//! Unknown keys are ignored. A missing, unreadable, malformed, or invalid
//! settings file is not an error from the perspective of the caller. Instead
//! default settings are used, and the reason for doing so is reported through
//! [`SettingsLoad::UsedDefault`].

use crate::path::{home_dir, settings_file_path};

use serde::{Deserialize, Serialize};
use serde_json::{error::Category, Number};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument, warn};

/// Backup settings layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Fallback values for command line options.
    #[serde(default)]
    pub defaults: Defaults,
}

impl Settings {
    /// Pick output directory from command line, falling back to settings.
    pub fn resolve_output_directory(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| self.defaults.output_directory.as_ref().map(PathBuf::from))
    }

    /// Pick compression level from command line, falling back to settings.
    pub fn resolve_compression_level(&self, flag: Option<CompressionLevel>) -> CompressionLevel {
        flag.unwrap_or(self.defaults.compression_level)
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = serde_json::from_str(data)?;

        if let Some(output_directory) = settings.defaults.output_directory.take() {
            // INVARIANT: Output directory must never be blank.
            if output_directory.is_empty() {
                return Err(ConfigError::EmptyOutputDirectory);
            }

            // INVARIANT: Only expand leading tilde, "$" is a valid path character.
            settings.defaults.output_directory =
                Some(shellexpand::tilde(output_directory.as_str()).into_owned());
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let json = serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?;
        fmt.write_str(json.as_str())
    }
}

/// Default values for command line options.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    /// Output directory to use when none is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,

    /// Compression level to use when none is given.
    #[serde(default)]
    pub compression_level: CompressionLevel,
}

/// Compression level handed to the archiver.
///
/// # Invariant
///
/// - Always an integer in the range 0 to 5 inclusive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "Number", into = "u8")]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// Lowest (store only) compression level.
    pub const MIN: u8 = 0;

    /// Highest (best) compression level.
    pub const MAX: u8 = 5;

    /// Construct new compression level.
    ///
    /// # Errors
    ///
    /// - Return [`CompressionLevelError`] if level is out of range.
    pub fn new(level: u8) -> Result<Self, CompressionLevelError> {
        Self::try_from(i64::from(level))
    }

    /// Numeric value of compression level.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl TryFrom<i64> for CompressionLevel {
    type Error = CompressionLevelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .filter(|level| (Self::MIN..=Self::MAX).contains(level))
            .map(Self)
            .ok_or_else(|| CompressionLevelError {
                value: value.to_string(),
            })
    }
}

impl TryFrom<Number> for CompressionLevel {
    type Error = CompressionLevelError;

    /// Accepts integers, and floats without a fractional part, e.g., `3.0`.
    fn try_from(value: Number) -> Result<Self, Self::Error> {
        let invalid = || CompressionLevelError {
            value: value.to_string(),
        };

        if let Some(level) = value.as_i64() {
            return Self::try_from(level).map_err(|_| invalid());
        }

        match value.as_f64() {
            Some(level) if level.fract() == 0.0 && level >= 0.0 && level <= f64::from(Self::MAX) => {
                Self::new(level as u8)
            }
            _ => Err(invalid()),
        }
    }
}

impl From<CompressionLevel> for u8 {
    fn from(level: CompressionLevel) -> Self {
        level.0
    }
}

impl FromStr for CompressionLevel {
    type Err = CompressionLevelError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        data.parse::<i64>()
            .map_err(|_| CompressionLevelError {
                value: data.to_owned(),
            })
            .and_then(Self::try_from)
    }
}

impl Display for CompressionLevel {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.0)
    }
}

/// Compression level outside of valid range, or not an integer at all.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Compression level must be an integer between 0 and 5, got {value:?}.")]
pub struct CompressionLevelError {
    value: String,
}

/// Outcome of reading the settings file.
#[derive(Debug)]
pub enum SettingsLoad {
    /// Settings file was found and is valid.
    Loaded { path: PathBuf, settings: Settings },

    /// Default settings are used instead.
    UsedDefault(DefaultReason),
}

impl SettingsLoad {
    /// Effective settings regardless of how they were obtained.
    pub fn into_settings(self) -> Settings {
        match self {
            Self::Loaded { settings, .. } => settings,
            Self::UsedDefault(_) => Settings::default(),
        }
    }
}

/// Why default settings were used.
#[derive(Debug, thiserror::Error)]
pub enum DefaultReason {
    /// Home directory cannot be determined.
    #[error("could not determine user profile path")]
    NoHomeDirectory,

    /// Settings file does not exist.
    #[error("backup settings file not found at {:?}", path.display())]
    NotFound { path: PathBuf },

    /// Settings file exists, but cannot be read.
    #[error("failed to read backup settings from {:?}", path.display())]
    Unreadable {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Settings file is not valid JSON.
    #[error("malformed backup settings found at {:?}", path.display())]
    Malformed {
        #[source]
        source: ConfigError,
        path: PathBuf,
    },

    /// Settings file is valid JSON, but does not fit the settings layout.
    #[error("invalid backup settings found at {:?}", path.display())]
    Invalid {
        #[source]
        source: ConfigError,
        path: PathBuf,
    },
}

/// Read settings file from user's home directory.
///
/// Never fails. Falls back to default settings when the home directory cannot
/// be determined, or the settings file cannot be used.
pub fn read_settings() -> SettingsLoad {
    match home_dir() {
        Ok(home) => read_settings_from(home),
        Err(_) => {
            let reason = DefaultReason::NoHomeDirectory;
            warn!("{reason}, using default settings");
            SettingsLoad::UsedDefault(reason)
        }
    }
}

/// Read settings file from a given home directory.
///
/// Never fails. Falls back to default settings if the settings file cannot
/// be used.
#[instrument(skip(home), level = "debug")]
pub fn read_settings_from(home: impl AsRef<Path>) -> SettingsLoad {
    let path = settings_file_path(home);
    match load(&path) {
        Ok(settings) => {
            debug!("successfully read backup settings from {:?}", path.display());
            SettingsLoad::Loaded { path, settings }
        }
        Err(reason @ DefaultReason::NotFound { .. }) => {
            debug!("{reason}, using default settings");
            SettingsLoad::UsedDefault(reason)
        }
        Err(reason) => {
            match std::error::Error::source(&reason) {
                Some(source) => warn!("{reason}, using default settings: {source}"),
                None => warn!("{reason}, using default settings"),
            }
            SettingsLoad::UsedDefault(reason)
        }
    }
}

fn load(path: &Path) -> Result<Settings, DefaultReason> {
    let data = read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => DefaultReason::NotFound {
            path: path.to_path_buf(),
        },
        _ => DefaultReason::Unreadable {
            source: err,
            path: path.to_path_buf(),
        },
    })?;

    data.parse().map_err(|err| match err {
        ConfigError::Deserialize(ref json) if json.classify() != Category::Data => {
            DefaultReason::Malformed {
                source: err,
                path: path.to_path_buf(),
            }
        }
        _ => DefaultReason::Invalid {
            source: err,
            path: path.to_path_buf(),
        },
    })
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize settings.
    #[error(transparent)]
    Deserialize(#[from] serde_json::Error),

    /// Output directory was given as an empty string.
    #[error("defaults.outputDirectory must not be empty")]
    EmptyOutputDirectory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;
    use std::fs::write;

    #[test]
    fn empty_object_yields_defaults() -> anyhow::Result<()> {
        let result: Settings = "{}".parse()?;
        assert_eq!(result.defaults.compression_level.get(), 5);
        assert_eq!(result.defaults.output_directory, None);
        Ok(())
    }

    #[test]
    fn deserialize_settings_ignores_unknown_keys() -> anyhow::Result<()> {
        let result: Settings = indoc! {r#"
            {
                "theme": "dark",
                "defaults": {
                    "outputDirectory": "/backups",
                    "compressionLevel": 3,
                    "verbose": true
                }
            }
        "#}
        .parse()?;

        let expect = Settings {
            defaults: Defaults {
                output_directory: Some("/backups".into()),
                compression_level: CompressionLevel::new(3)?,
            },
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn deserialize_settings_expands_tilde() -> anyhow::Result<()> {
        let result: Settings = r#"{ "defaults": { "outputDirectory": "~/backups" } }"#.parse()?;
        assert_eq!(
            result.defaults.output_directory.as_deref(),
            Some("/home/blah/backups")
        );
        Ok(())
    }

    #[sealed_test(env = [("BLAH", "/home/blah")])]
    fn deserialize_settings_keeps_dollar_signs() -> anyhow::Result<()> {
        let result: Settings = indoc! {r#"
            { "defaults": { "outputDirectory": "/data/b$kups/$BLAH", "compressionLevel": 2 } }
        "#}
        .parse()?;

        let expect = Settings {
            defaults: Defaults {
                output_directory: Some("/data/b$kups/$BLAH".into()),
                compression_level: CompressionLevel::new(2)?,
            },
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn settings_file_with_dollar_sign_is_loaded() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        write(
            settings_file_path(home.path()),
            r#"{ "defaults": { "outputDirectory": "/data/b$kups", "compressionLevel": 1 } }"#,
        )?;

        let settings = match read_settings_from(home.path()) {
            SettingsLoad::Loaded { settings, .. } => settings,
            SettingsLoad::UsedDefault(reason) => anyhow::bail!("expected settings, got {reason}"),
        };
        assert_eq!(settings.defaults.output_directory.as_deref(), Some("/data/b$kups"));
        assert_eq!(settings.defaults.compression_level.get(), 1);

        Ok(())
    }

    #[test_case(r#"{ "defaults": { "compressionLevel": 3.0 } }"#, 3; "integral float")]
    #[test_case(r#"{ "defaults": { "compressionLevel": 0.0 } }"#, 0; "zero float")]
    #[test_case(r#"{ "defaults": { "compressionLevel": 4 } }"#, 4; "integer")]
    #[test]
    fn deserialize_settings_accepts_integral_level(data: &str, expect: u8) -> anyhow::Result<()> {
        let result: Settings = data.parse()?;
        pretty_assertions::assert_eq!(result.defaults.compression_level.get(), expect);
        Ok(())
    }

    #[test_case(r#"{ "defaults": { "compressionLevel": 6 } }"#; "level above range")]
    #[test_case(r#"{ "defaults": { "compressionLevel": -1 } }"#; "level below range")]
    #[test_case(r#"{ "defaults": { "compressionLevel": 2.5 } }"#; "fractional level")]
    #[test_case(r#"{ "defaults": { "compressionLevel": 6.0 } }"#; "float above range")]
    #[test_case(r#"{ "defaults": { "compressionLevel": -1.0 } }"#; "negative float")]
    #[test_case(r#"{ "defaults": { "compressionLevel": 18446744073709551615 } }"#; "huge level")]
    #[test_case(r#"{ "defaults": { "compressionLevel": "3" } }"#; "string level")]
    #[test_case(r#"{ "defaults": { "outputDirectory": "" } }"#; "empty output directory")]
    #[test_case(r#"{ "defaults": { "outputDirectory": 42 } }"#; "numeric output directory")]
    #[test]
    fn deserialize_settings_rejects_bad_shape(data: &str) {
        assert!(data.parse::<Settings>().is_err());
    }

    #[test]
    fn settings_file_missing_uses_default() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let result = read_settings_from(home.path());
        assert!(matches!(
            result,
            SettingsLoad::UsedDefault(DefaultReason::NotFound { .. })
        ));
        assert_eq!(result.into_settings(), Settings::default());
        Ok(())
    }

    #[test]
    fn settings_file_malformed_uses_default() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        write(settings_file_path(home.path()), "{ not json")?;
        let result = read_settings_from(home.path());
        assert!(matches!(
            result,
            SettingsLoad::UsedDefault(DefaultReason::Malformed { .. })
        ));
        assert_eq!(result.into_settings(), Settings::default());
        Ok(())
    }

    #[test]
    fn settings_file_invalid_uses_default() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        write(
            settings_file_path(home.path()),
            r#"{ "defaults": { "outputDirectory": "/backups", "compressionLevel": 9 } }"#,
        )?;
        let result = read_settings_from(home.path());
        assert!(matches!(
            result,
            SettingsLoad::UsedDefault(DefaultReason::Invalid { .. })
        ));
        assert_eq!(result.into_settings(), Settings::default());
        Ok(())
    }

    #[test]
    fn settings_file_directory_is_unreadable() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        std::fs::create_dir(settings_file_path(home.path()))?;
        let result = read_settings_from(home.path());
        assert!(matches!(
            result,
            SettingsLoad::UsedDefault(DefaultReason::Unreadable { .. })
        ));
        Ok(())
    }

    #[sealed_test(env = [("HOME", ".")])]
    fn read_settings_from_home() -> anyhow::Result<()> {
        write(
            "xdxd-backup.json",
            r#"{ "defaults": { "outputDirectory": "/backups", "compressionLevel": 2 } }"#,
        )?;

        let result = read_settings();
        assert!(matches!(result, SettingsLoad::Loaded { .. }));

        let settings = result.into_settings();
        assert_eq!(settings.defaults.output_directory.as_deref(), Some("/backups"));
        assert_eq!(settings.defaults.compression_level.get(), 2);

        Ok(())
    }

    #[test]
    fn command_line_takes_precedence() -> anyhow::Result<()> {
        let settings = Settings {
            defaults: Defaults {
                output_directory: Some("/from/settings".into()),
                compression_level: CompressionLevel::new(1)?,
            },
        };

        assert_eq!(
            settings.resolve_output_directory(Some("/from/flag".into())),
            Some(PathBuf::from("/from/flag"))
        );
        assert_eq!(
            settings.resolve_output_directory(None),
            Some(PathBuf::from("/from/settings"))
        );
        assert_eq!(
            settings.resolve_compression_level(Some(CompressionLevel::new(4)?)).get(),
            4
        );
        assert_eq!(settings.resolve_compression_level(None).get(), 1);
        assert_eq!(Settings::default().resolve_output_directory(None), None);

        Ok(())
    }

    #[test_case("0", 0; "lowest")]
    #[test_case("3", 3; "middle")]
    #[test_case("5", 5; "highest")]
    #[test]
    fn compression_level_accepts_range(data: &str, expect: u8) -> anyhow::Result<()> {
        pretty_assertions::assert_eq!(data.parse::<CompressionLevel>()?.get(), expect);
        Ok(())
    }

    #[test_case("6"; "above range")]
    #[test_case("-1"; "below range")]
    #[test_case("abc"; "not a number")]
    #[test_case("2.5"; "fractional")]
    #[test_case(""; "empty")]
    #[test]
    fn compression_level_rejects_garbage(data: &str) {
        let result = data.parse::<CompressionLevel>().unwrap_err();
        assert!(result.to_string().contains("between 0 and 5"));
    }
}
