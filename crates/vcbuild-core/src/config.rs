//! Run configuration.
//!
//! One [`RunConfig`] is built at startup and handed to every stage. Paths are
//! stored already resolved against the source directory.

use std::path::{Path, PathBuf};

use vcbuild_schema::{BuildType, DEFAULT_CUSTOM_PORT_DIR, DEFAULT_SETTINGS_FILE, Triplet};

use crate::paths::resolve_relative;
use crate::process::Vcpkg;

/// Default vcpkg repository (the archive lives at `<url>/archive/master.zip`).
pub const DEFAULT_TOOL_URL: &str = "https://github.com/Microsoft/vcpkg";
/// Default vcpkg checkout directory, relative to the source directory.
pub const DEFAULT_TOOL_DIR: &str = "build-vcpkg";
/// Default CMake build tree, relative to the source directory.
pub const DEFAULT_BUILD_DIR: &str = "build";

/// Everything a run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Project source tree (absolute).
    pub source_dir: PathBuf,
    /// CMake build tree.
    pub build_dir: PathBuf,
    /// Project settings file.
    pub settings_file: PathBuf,
    /// Locally-authored ports mirrored into the tool.
    pub custom_port_dir: PathBuf,
    /// vcpkg checkout.
    pub tool_dir: PathBuf,
    /// Target triplet for every tool call.
    pub triplet: Triplet,
    /// CMake build type.
    pub build_type: BuildType,
    /// Explicit CMake binary; looked up on `PATH` when absent.
    pub cmake_binary: Option<PathBuf>,
    /// vcpkg repository URL.
    pub tool_url: String,
    /// Debug output requested.
    pub verbose: bool,
}

impl RunConfig {
    /// Configuration with every path at its default under `source_dir`.
    pub fn new(source_dir: &Path) -> Self {
        let source_dir = source_dir.to_path_buf();
        Self {
            build_dir: resolve_relative(&source_dir, Path::new(DEFAULT_BUILD_DIR)),
            settings_file: resolve_relative(&source_dir, Path::new(DEFAULT_SETTINGS_FILE)),
            custom_port_dir: resolve_relative(&source_dir, Path::new(DEFAULT_CUSTOM_PORT_DIR)),
            tool_dir: resolve_relative(&source_dir, Path::new(DEFAULT_TOOL_DIR)),
            source_dir,
            triplet: Triplet::host(),
            build_type: BuildType::default(),
            cmake_binary: None,
            tool_url: DEFAULT_TOOL_URL.to_string(),
            verbose: false,
        }
    }

    /// Set the build tree (relative paths resolve against the source dir).
    pub fn with_build_dir(mut self, path: &Path) -> Self {
        self.build_dir = resolve_relative(&self.source_dir, path);
        self
    }

    /// Set the settings file (relative paths resolve against the source dir).
    pub fn with_settings_file(mut self, path: &Path) -> Self {
        self.settings_file = resolve_relative(&self.source_dir, path);
        self
    }

    /// Set the custom port directory (relative paths resolve against the
    /// source dir).
    pub fn with_custom_port_dir(mut self, path: &Path) -> Self {
        self.custom_port_dir = resolve_relative(&self.source_dir, path);
        self
    }

    /// Set the vcpkg checkout (relative paths resolve against the source dir).
    pub fn with_tool_dir(mut self, path: &Path) -> Self {
        self.tool_dir = resolve_relative(&self.source_dir, path);
        self
    }

    /// The package tool bound to this configuration's checkout and triplet.
    pub fn vcpkg(&self) -> Vcpkg {
        Vcpkg::new(&self.tool_dir, self.triplet.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::PackageTool;

    #[test]
    fn test_defaults_resolve_under_source() {
        let config = RunConfig::new(Path::new("/work/proj"));
        assert_eq!(config.build_dir, PathBuf::from("/work/proj/build"));
        assert_eq!(config.settings_file, PathBuf::from("/work/proj/.build-py"));
        assert_eq!(config.custom_port_dir, PathBuf::from("/work/proj/extern/vcpkg/ports"));
        assert_eq!(config.tool_dir, PathBuf::from("/work/proj/build-vcpkg"));
        assert_eq!(config.build_type, BuildType::Release);
        assert_eq!(config.tool_url, DEFAULT_TOOL_URL);
    }

    #[test]
    fn test_overrides_resolve_relative() {
        let config = RunConfig::new(Path::new("/work/proj"))
            .with_tool_dir(Path::new("../shared/vcpkg"))
            .with_build_dir(Path::new("out"));
        assert_eq!(config.tool_dir, PathBuf::from("/work/shared/vcpkg"));
        assert_eq!(config.build_dir, PathBuf::from("/work/proj/out"));
        assert_eq!(config.vcpkg().root(), Path::new("/work/shared/vcpkg"));
    }
}
