//! Extractors for vcpkg's human-readable output.
//!
//! vcpkg has no machine-readable interface for these queries, so each
//! extractor looks for a fixed header line first and only then pulls package
//! identifiers out of the indented lines below it. Text that carries neither
//! the "nothing to do" header nor the "will do X" header is unrecognized and
//! becomes [`EngineError::UnrecognizedOutput`]; it is never read as an empty
//! list.

use std::sync::LazyLock;

use regex::Regex;
use vcbuild_schema::PackageName;

use crate::EngineError;
use crate::process::ToolOutput;

/// `update`: nothing is outdated.
pub const NOTHING_TO_UPGRADE: &str = "No packages need updating.";
/// `update`: outdated packages follow.
pub const UPGRADE_HEADER: &str = "The following packages differ from their port versions:";
/// `install`: the requested package is already present.
pub const ALREADY_INSTALLED: &str = "The following packages are already installed:";
/// `install`: packages that will be (or were) built follow.
pub const WILL_INSTALL: &str = "The following packages will be built and installed:";
/// `remove`: the requested package is absent.
pub const NOT_INSTALLED: &str = "The following packages are not installed, so not removed:";
/// `remove`: packages that will be (or were) removed follow.
pub const WILL_REMOVE: &str = "The following packages will be removed:";

/// `    zlib:x64-linux        1.2.11-5 -> 1.2.11-6`
static UPGRADE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {4}([^:\s][^:]*):[\w-]+(?:\s.*)?$").expect("upgrade line pattern")
});

/// `  * zlib[core]:x64-linux` (the star marks packages pulled in besides the
/// one named on the command line)
static STARRED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {2}\* ([^:\s][^:]*):[\w-]+\s*$").expect("starred line pattern")
});

/// Leading colon-delimited token of `list` / `depend-info` lines.
static LEADING_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:\s][^:]*):").expect("leading token pattern"));

/// Result of a real (non dry-run) `install <pkg>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Nothing to do.
    AlreadyInstalled,
    /// Built and installed.
    Installed,
    /// Neither header with a clean exit; caller surfaces build logs.
    Failed,
}

/// Result of a real `remove <pkg>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Nothing to do.
    NotInstalled,
    /// Removed.
    Removed,
}

fn has_header(text: &str, header: &str) -> bool {
    text.lines().any(|line| line.trim_end() == header)
}

fn capture_all(text: &str, pattern: &Regex) -> Vec<PackageName> {
    text.lines()
        .filter_map(|line| pattern.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| PackageName::new(m.as_str()))
        .collect()
}

/// Packages whose installed version differs from the port version (`update`).
///
/// # Errors
///
/// Returns [`EngineError::UnrecognizedOutput`] if neither header is present.
pub fn list_upgradeable(output: &ToolOutput) -> Result<Vec<PackageName>, EngineError> {
    if has_header(&output.stdout, NOTHING_TO_UPGRADE) {
        return Ok(Vec::new());
    }
    if has_header(&output.stdout, UPGRADE_HEADER) {
        return Ok(capture_all(&output.stdout, &UPGRADE_LINE));
    }
    Err(EngineError::unrecognized(output))
}

/// Dependencies that `install --dry-run <pkg>` would build.
///
/// `None` means the package is already installed and discovery stops here.
///
/// # Errors
///
/// Returns [`EngineError::UnrecognizedOutput`] if neither header is present.
pub fn dependencies_for(output: &ToolOutput) -> Result<Option<Vec<PackageName>>, EngineError> {
    if has_header(&output.stdout, ALREADY_INSTALLED) {
        return Ok(None);
    }
    if has_header(&output.stdout, WILL_INSTALL) {
        return Ok(Some(capture_all(&output.stdout, &STARRED_LINE)));
    }
    Err(EngineError::unrecognized(output))
}

/// Dependents that `remove --recurse --dry-run <pkg>` would take down with it.
///
/// `None` means the package is not installed and there is nothing to remove.
///
/// # Errors
///
/// Returns [`EngineError::UnrecognizedOutput`] if neither header is present.
pub fn removal_dependents_for(
    output: &ToolOutput,
) -> Result<Option<Vec<PackageName>>, EngineError> {
    if has_header(&output.stdout, NOT_INSTALLED) {
        return Ok(None);
    }
    if has_header(&output.stdout, WILL_REMOVE) {
        return Ok(Some(capture_all(&output.stdout, &STARRED_LINE)));
    }
    Err(EngineError::unrecognized(output))
}

/// Every installed package (`list`).
///
/// `list` has no header to anchor on, so a non-zero exit is what marks the
/// output as unusable. Lines without a `name:` prefix (such as the "No
/// packages are installed" notice) are skipped.
///
/// # Errors
///
/// Returns [`EngineError::UnrecognizedOutput`] if the command failed.
pub fn list_installed(output: &ToolOutput) -> Result<Vec<PackageName>, EngineError> {
    leading_tokens(output)
}

/// The tool's transitive closure for a root set (`depend-info <roots...>`).
///
/// # Errors
///
/// Returns [`EngineError::UnrecognizedOutput`] if the command failed.
pub fn list_needed(output: &ToolOutput) -> Result<Vec<PackageName>, EngineError> {
    leading_tokens(output)
}

fn leading_tokens(output: &ToolOutput) -> Result<Vec<PackageName>, EngineError> {
    if !output.success() {
        return Err(EngineError::unrecognized(output));
    }
    Ok(capture_all(&output.stdout, &LEADING_TOKEN))
}

/// Classify a real `install <pkg>`.
pub fn install_outcome(output: &ToolOutput) -> InstallOutcome {
    if has_header(&output.stdout, ALREADY_INSTALLED) {
        InstallOutcome::AlreadyInstalled
    } else if has_header(&output.stdout, WILL_INSTALL) && output.success() {
        InstallOutcome::Installed
    } else {
        InstallOutcome::Failed
    }
}

/// Classify a real `remove <pkg>`.
///
/// # Errors
///
/// Returns [`EngineError::UnrecognizedOutput`] if neither header is present.
pub fn remove_outcome(output: &ToolOutput) -> Result<RemoveOutcome, EngineError> {
    if has_header(&output.stdout, NOT_INSTALLED) {
        Ok(RemoveOutcome::NotInstalled)
    } else if has_header(&output.stdout, WILL_REMOVE) {
        Ok(RemoveOutcome::Removed)
    } else {
        Err(EngineError::unrecognized(output))
    }
}
