//! Subprocess plumbing for the vcpkg executable.
//!
//! Every call goes through [`PackageTool::invoke`], which always prepends the
//! installation root and target triplet. Output is captured in full and
//! decoded before any scraping happens. A non-zero exit status is returned,
//! not raised: callers decide what it means based on the text.

use std::path::{Path, PathBuf};
use std::process::Command;

use vcbuild_schema::Triplet;

use crate::EngineError;

/// Captured result of one subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Human-readable command line, for diagnostics.
    pub command: String,
    /// Exit code, `None` if terminated by a signal.
    pub status: Option<i32>,
    /// Decoded standard output.
    pub stdout: String,
    /// Decoded standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// The seam between the engine and the package manager.
///
/// [`Vcpkg`] is the real implementation; tests script responses instead.
pub trait PackageTool {
    /// Run `<tool> <global flags> <args...>` to completion and capture it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Launch`] if the process cannot be spawned.
    fn invoke(&self, args: &[&str]) -> Result<ToolOutput, EngineError>;

    /// Installation root of the tool (where `buildtrees/` lives).
    fn root(&self) -> &Path;
}

impl<T: PackageTool + ?Sized> PackageTool for &T {
    fn invoke(&self, args: &[&str]) -> Result<ToolOutput, EngineError> {
        (**self).invoke(args)
    }

    fn root(&self) -> &Path {
        (**self).root()
    }
}

/// File name of the vcpkg executable on this platform.
pub fn tool_exe_name() -> &'static str {
    if cfg!(windows) { "vcpkg.exe" } else { "vcpkg" }
}

/// Decode captured bytes as UTF-8, normalizing Windows line endings so the
/// scraper only ever sees `\n`.
pub fn decode_output(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if cfg!(windows) {
        text.replace("\r\n", "\n")
    } else {
        text.into_owned()
    }
}

/// Render a command line for logs and diagnostics.
pub fn render_command(program: &Path, args: &[&str]) -> String {
    std::iter::once(program.display().to_string())
        .chain(args.iter().map(|a| (*a).to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a prepared command to completion with both streams captured.
///
/// # Errors
///
/// Returns [`EngineError::Launch`] if the process cannot be spawned.
pub fn run_captured(cmd: &mut Command, rendered: String) -> Result<ToolOutput, EngineError> {
    tracing::debug!(command = %rendered, "spawning");
    let output = cmd.output().map_err(|source| EngineError::Launch {
        program: cmd.get_program().to_string_lossy().into_owned(),
        source,
    })?;

    let result = ToolOutput {
        command: rendered,
        status: output.status.code(),
        stdout: decode_output(&output.stdout),
        stderr: decode_output(&output.stderr),
    };
    tracing::trace!(status = ?result.status, stdout = %result.stdout, "finished");
    Ok(result)
}

/// A vcpkg checkout bound to one target triplet.
#[derive(Debug, Clone)]
pub struct Vcpkg {
    executable: PathBuf,
    root: PathBuf,
    triplet: Triplet,
}

impl Vcpkg {
    /// Use the executable inside `root` (where bootstrapping puts it).
    pub fn new(root: &Path, triplet: Triplet) -> Self {
        Self {
            executable: root.join(tool_exe_name()),
            root: root.to_path_buf(),
            triplet,
        }
    }

    /// Use an explicit executable path.
    pub fn with_executable(executable: PathBuf, root: &Path, triplet: Triplet) -> Self {
        Self {
            executable,
            root: root.to_path_buf(),
            triplet,
        }
    }

    /// Path of the executable that will be spawned.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Target triplet passed on every call.
    pub fn triplet(&self) -> &Triplet {
        &self.triplet
    }

    fn full_args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let root = self.root.to_str().unwrap_or_default();
        let mut full = vec!["--vcpkg-root", root, "--triplet", self.triplet.as_str()];
        full.extend_from_slice(args);
        full
    }
}

impl PackageTool for Vcpkg {
    fn invoke(&self, args: &[&str]) -> Result<ToolOutput, EngineError> {
        let full = self.full_args(args);
        let mut cmd = Command::new(&self.executable);
        // The root goes in as an OsStr so non-UTF-8 paths survive.
        cmd.arg("--vcpkg-root")
            .arg(&self.root)
            .args(&full[2..]);
        run_captured(&mut cmd, render_command(&self.executable, &full))
    }

    fn root(&self) -> &Path {
        &self.root
    }
}
