//! CMake configure and build steps.

use std::path::{Path, PathBuf};
use std::process::Command;

use vcbuild_schema::{BuildType, Triplet};

use crate::EngineError;
use crate::paths::toolchain_file;
use crate::process::{ToolOutput, render_command, run_captured};
use crate::reporter::{Reporter, run_phase};

/// A located CMake binary.
#[derive(Debug, Clone)]
pub struct Cmake {
    binary: PathBuf,
}

impl Cmake {
    /// Use `explicit` if given, otherwise the first `cmake` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ToolMissing`] if no binary can be found.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, EngineError> {
        if let Some(path) = explicit {
            return Ok(Self::at(path));
        }
        let binary = which::which("cmake").map_err(|e| {
            tracing::debug!(error = %e, "cmake lookup failed");
            EngineError::ToolMissing("cmake".to_string())
        })?;
        Ok(Self { binary })
    }

    /// Use the binary at `path` as-is.
    pub fn at(path: &Path) -> Self {
        Self {
            binary: path.to_path_buf(),
        }
    }

    /// Path of the binary that will be run.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments for generating `build_dir` from `source_dir` with the vcpkg
    /// toolchain wired in.
    pub fn configure_args(
        source_dir: &Path,
        build_dir: &Path,
        tool_dir: &Path,
        build_type: BuildType,
        triplet: &Triplet,
    ) -> Vec<String> {
        vec![
            "-S".to_string(),
            source_dir.display().to_string(),
            "-B".to_string(),
            build_dir.display().to_string(),
            format!("-DCMAKE_BUILD_TYPE={}", build_type.cmake_name()),
            format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain_file(tool_dir).display()),
            format!("-DVCPKG_TARGET_TRIPLET={triplet}"),
        ]
    }

    /// Arguments for building an already configured tree.
    pub fn build_args(build_dir: &Path, build_type: BuildType) -> Vec<String> {
        vec![
            "--build".to_string(),
            build_dir.display().to_string(),
            "--config".to_string(),
            build_type.cmake_name().to_string(),
        ]
    }

    fn run(&self, args: &[String]) -> Result<ToolOutput, EngineError> {
        let borrowed: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut cmd = Command::new(&self.binary);
        cmd.args(&borrowed);
        let output = run_captured(&mut cmd, render_command(&self.binary, &borrowed))?;
        if output.success() {
            Ok(output)
        } else {
            Err(EngineError::command_failed(&output))
        }
    }

    /// Configure the build tree.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CommandFailed`] if CMake exits non-zero.
    pub fn configure(
        &self,
        source_dir: &Path,
        build_dir: &Path,
        tool_dir: &Path,
        build_type: BuildType,
        triplet: &Triplet,
        reporter: &dyn Reporter,
    ) -> Result<(), EngineError> {
        let args = Self::configure_args(source_dir, build_dir, tool_dir, build_type, triplet);
        run_phase(reporter, "Configuring cmake", || {
            self.run(&args)?;
            Ok(((), "Ok".to_string()))
        })
    }

    /// Build the configured tree.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CommandFailed`] if the build fails.
    pub fn build(
        &self,
        build_dir: &Path,
        build_type: BuildType,
        reporter: &dyn Reporter,
    ) -> Result<(), EngineError> {
        let args = Self::build_args(build_dir, build_type);
        run_phase(reporter, &format!("Building ({build_type})"), || {
            self.run(&args)?;
            Ok(((), "Ok".to_string()))
        })
    }
}
