//! Fatal conditions raised by the engine.
//!
//! Nothing in this crate terminates the process. Every failure travels up as
//! an [`EngineError`]; the binary renders [`EngineError::diagnostics`] and
//! exits non-zero.

use std::path::PathBuf;

use vcbuild_schema::PackageName;

use crate::process::ToolOutput;

/// A build log found under `buildtrees/<package>/` after a failed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLog {
    /// Absolute path of the log file.
    pub path: PathBuf,
    /// Full contents (lossily decoded).
    pub contents: String,
}

/// Everything that can abort a run.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The tool answered with text that matched none of the known headers.
    #[error("Unrecognized output from `{command}`")]
    UnrecognizedOutput {
        /// Rendered command line.
        command: String,
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The subprocess could not be started at all.
    #[error("Failed to launch {program}: {source}")]
    Launch {
        /// Program that failed to start.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// `install <pkg>` did not report success.
    #[error("Failed to install {package}")]
    InstallFailed {
        /// Package whose install failed.
        package: PackageName,
        /// Rendered command line.
        command: String,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
        /// Build logs left under the package's build tree.
        logs: Vec<BuildLog>,
    },

    /// A helper command (bootstrap script, CMake) exited non-zero.
    #[error("`{command}` failed with exit code {status:?}")]
    CommandFailed {
        /// Rendered command line.
        command: String,
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The dependency relation reported by the tool is not acyclic.
    #[error("Circular dependency detected: {}", join_cycle(.cycle))]
    DependencyCycle {
        /// The path around the cycle, first node repeated at the end.
        cycle: Vec<PackageName>,
    },

    /// A file could not be replaced because another program holds it open.
    #[error("{} is in use. The external application holding it must be closed", .path.display())]
    ArtifactInUse {
        /// The locked file.
        path: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path the operation touched.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The tool archive could not be fetched.
    #[error("Failed to download {url}: {message}")]
    Download {
        /// Requested URL.
        url: String,
        /// Transport or HTTP status error, as text.
        message: String,
    },

    /// The downloaded archive is not a readable zip.
    #[error("Failed to extract tool archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The tool directory is still incomplete after download.
    #[error("vcpkg failed to download for unknown reasons ({} is incomplete)", .0.display())]
    ToolIncomplete(PathBuf),

    /// A required external program is not on `PATH`.
    #[error("{0} not found. Install it or pass its path explicitly")]
    ToolMissing(String),
}

fn join_cycle(cycle: &[PackageName]) -> String {
    cycle
        .iter()
        .map(PackageName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl EngineError {
    /// Build an [`EngineError::UnrecognizedOutput`] from a captured invocation.
    pub fn unrecognized(output: &ToolOutput) -> Self {
        Self::UnrecognizedOutput {
            command: output.command.clone(),
            status: output.status,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        }
    }

    /// Build an [`EngineError::CommandFailed`] from a captured invocation.
    pub fn command_failed(output: &ToolOutput) -> Self {
        Self::CommandFailed {
            command: output.command.clone(),
            status: output.status,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short status word for the progress line that was open when this
    /// error surfaced.
    pub fn status_word(&self) -> &'static str {
        match self {
            Self::UnrecognizedOutput { .. } => "Unknown error",
            Self::Launch { .. } | Self::ToolMissing(_) => "Not Found",
            _ => "Failed",
        }
    }

    /// Titled blocks of captured context to print before exiting.
    ///
    /// Order matters: the command line first, then stdout, stderr and any
    /// build logs.
    pub fn diagnostics(&self) -> Vec<(String, String)> {
        let streams = |command: &str, stdout: &str, stderr: &str| {
            vec![
                ("invocation".to_string(), command.to_string()),
                ("stdout".to_string(), stdout.to_string()),
                ("stderr".to_string(), stderr.to_string()),
            ]
        };

        match self {
            Self::UnrecognizedOutput {
                command,
                stdout,
                stderr,
                ..
            }
            | Self::CommandFailed {
                command,
                stdout,
                stderr,
                ..
            } => streams(command, stdout, stderr),
            Self::InstallFailed {
                command,
                stdout,
                stderr,
                logs,
                ..
            } => {
                let mut blocks = streams(command, stdout, stderr);
                blocks.extend(
                    logs.iter()
                        .map(|log| (log.path.display().to_string(), log.contents.clone())),
                );
                blocks
            }
            _ => Vec::new(),
        }
    }
}
