//! Project settings file (`.build-py` by default).
//!
//! A line-oriented `key = value` format:
//!
//! ```text
//! # comment
//! name = bve-reborn
//! version = 0.1.0
//! packages = abseil, cli11, fmt[core], glm
//! ```
//!
//! Recognized keys are `name` (alias `project`), `version` and `packages`.
//! Anything else is rejected with the offending line number before any tool
//! is invoked.

use std::path::Path;

/// Errors raised while reading the settings file.
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    /// A non-comment line has no `=`.
    #[error("No equals sign found in config file line: {line}")]
    MissingEquals {
        /// 1-based line number.
        line: usize,
    },

    /// The key is not one of `name`, `project`, `version`, `packages`.
    #[error("Unknown key on line {line}: {key}")]
    UnknownKey {
        /// 1-based line number.
        line: usize,
        /// The rejected key.
        key: String,
    },

    /// A package entry contains an embedded space.
    #[error("Space found in package list on line {line}: {packages:?}")]
    SpaceInPackageList {
        /// 1-based line number.
        line: usize,
        /// The list as parsed so far.
        packages: Vec<String>,
    },

    /// The file exists but could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Settings file path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl SettingsError {
    /// Line number the error refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::MissingEquals { line }
            | Self::UnknownKey { line, .. }
            | Self::SpaceInPackageList { line, .. } => Some(*line),
            Self::Io { .. } => None,
        }
    }
}

/// Parsed project settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSettings {
    /// Project name (`name` or `project` key).
    pub project_name: Option<String>,
    /// Project version string.
    pub version: Option<String>,
    /// Requested top-level packages, as written.
    pub packages: Vec<String>,
}

impl ProjectSettings {
    /// Parse settings from file contents.
    ///
    /// Blank lines and lines starting with `#` are ignored. A repeated key
    /// overwrites the earlier value.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] for a line without `=`, an unknown key, or
    /// a package entry with an embedded space.
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        for (idx, raw) in content.lines().enumerate() {
            let line = idx + 1;
            if raw.trim().is_empty() || raw.starts_with('#') {
                continue;
            }

            let Some((key, value)) = raw.split_once('=') else {
                return Err(SettingsError::MissingEquals { line });
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "name" | "project" => settings.project_name = Some(value.to_string()),
                "version" => settings.version = Some(value.to_string()),
                "packages" => {
                    let packages: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect();
                    if packages.iter().any(|p| p.contains(' ')) {
                        return Err(SettingsError::SpaceInPackageList { line, packages });
                    }
                    settings.packages = packages;
                }
                _ => {
                    return Err(SettingsError::UnknownKey {
                        line,
                        key: key.to_string(),
                    });
                }
            }
        }

        Ok(settings)
    }

    /// Load settings from `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist so the caller can
    /// report it and continue with empty settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the file exists but cannot be read or
    /// fails to parse.
    pub fn load(path: &Path) -> Result<Option<Self>, SettingsError> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content).map(Some)
    }

    /// One-line banner, e.g. `Building version 0.1.0 of bve`.
    pub fn banner(&self) -> Option<String> {
        let name = self.project_name.as_deref()?;
        Some(match self.version.as_deref() {
            Some(v) => format!("Building version {v} of {name}"),
            None => format!("Building {name}"),
        })
    }
}
