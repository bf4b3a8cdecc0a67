//! vcbuild - keeps a C/C++ project's vcpkg dependencies in sync and drives
//! its CMake build.
//!
//! # Pipeline
//!
//! ```text
//! settings file ─▶ fetch vcpkg ─▶ mirror ports ─▶ sync packages ─▶ configure ─▶ build
//! ```
//!
//! Each stage can be selected on its own with a `--*-only` flag; see
//! [`PhaseArgs`].

pub mod pipeline;
pub mod ui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser};

use vcbuild_core::RunConfig;
use vcbuild_core::config::{DEFAULT_BUILD_DIR, DEFAULT_TOOL_DIR, DEFAULT_TOOL_URL};
use vcbuild_core::paths::resolve_relative;
use vcbuild_schema::{BuildType, DEFAULT_CUSTOM_PORT_DIR, DEFAULT_SETTINGS_FILE, Triplet};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "vcbuild")]
#[command(author, version, about = "Sync vcpkg dependencies and build a CMake project", long_about = None)]
pub struct Cli {
    /// Enable debug output
    #[arg(short, long, alias = "debug")]
    pub verbose: bool,

    /// Location of the source directory (default: current directory)
    #[arg(value_name = "SOURCE_DIR", help_heading = "Path Settings")]
    pub source_dir: Option<PathBuf>,

    /// Folder to store the build tree in. Relative to source dir if not absolute
    #[arg(long, value_name = "DIR", default_value = DEFAULT_BUILD_DIR, help_heading = "Path Settings")]
    pub build_dir: PathBuf,

    /// Path to config file. Relative to source dir if not absolute
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SETTINGS_FILE, help_heading = "Path Settings")]
    pub config_file: PathBuf,

    /// Folder with custom vcpkg ports to install. Relative to source dir if not absolute
    #[arg(long, value_name = "DIR", default_value = DEFAULT_CUSTOM_PORT_DIR, help_heading = "Path Settings")]
    pub custom_port_dir: PathBuf,

    /// Folder to install vcpkg in. Relative to source dir if not absolute
    #[arg(long, value_name = "DIR", default_value = DEFAULT_TOOL_DIR, help_heading = "Path Settings")]
    pub vcpkg_dir: PathBuf,

    /// Type of build: debug, size, debug_release or release
    #[arg(
        long = "type",
        value_name = "TYPE",
        default_value = "release",
        help = "Type of build: debug, size, debug_release or release",
        help_heading = "Build Settings"
    )]
    pub build_type: BuildType,

    /// vcpkg target triplet (default: host platform)
    #[arg(long, value_name = "TRIPLET", help_heading = "Build Settings")]
    pub triplet: Option<Triplet>,

    /// Stage selection.
    #[command(flatten)]
    pub phases: PhaseArgs,

    /// Path to cmake (default: first cmake on PATH)
    #[arg(long, value_name = "PATH", help_heading = "External Tools")]
    pub cmake_binary: Option<PathBuf>,

    /// URL of vcpkg's repository
    #[arg(long, value_name = "URL", default_value = DEFAULT_TOOL_URL, help_heading = "External Tools")]
    pub vcpkg_url: String,
}

/// Stage selectors. At most one may be given; none means the full pipeline.
#[derive(Debug, Clone, Copy, Default, Args)]
#[group(multiple = false)]
pub struct PhaseArgs {
    /// Only install vcpkg. Do not install packages
    #[arg(long, help_heading = "Build Settings")]
    pub vcpkg_only: bool,

    /// Only copy custom ports. Do not build or install packages
    #[arg(long, help_heading = "Build Settings")]
    pub copy_deps_only: bool,

    /// Only install vcpkg and packages. Do not build
    #[arg(long, help_heading = "Build Settings")]
    pub deps_only: bool,

    /// Only configure cmake
    #[arg(long, help_heading = "Build Settings")]
    pub configure_only: bool,

    /// Only configure cmake and build
    #[arg(long, help_heading = "Build Settings")]
    pub build_only: bool,
}

/// The stages a run will execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tasks {
    /// Download and bootstrap vcpkg.
    pub fetch_tool: bool,
    /// Mirror custom ports into the vcpkg checkout.
    pub copy_ports: bool,
    /// Upgrade, install and prune packages.
    pub packages: bool,
    /// Run the CMake configure step.
    pub configure: bool,
    /// Run the CMake build step.
    pub build: bool,
}

impl Tasks {
    /// Every stage.
    pub const ALL: Self = Self {
        fetch_tool: true,
        copy_ports: true,
        packages: true,
        configure: true,
        build: true,
    };

    const NONE: Self = Self {
        fetch_tool: false,
        copy_ports: false,
        packages: false,
        configure: false,
        build: false,
    };
}

impl From<PhaseArgs> for Tasks {
    fn from(phases: PhaseArgs) -> Self {
        if phases.vcpkg_only {
            Self {
                fetch_tool: true,
                ..Self::NONE
            }
        } else if phases.copy_deps_only {
            Self {
                copy_ports: true,
                ..Self::NONE
            }
        } else if phases.deps_only {
            Self {
                fetch_tool: true,
                copy_ports: true,
                packages: true,
                ..Self::NONE
            }
        } else if phases.configure_only {
            Self {
                configure: true,
                ..Self::NONE
            }
        } else if phases.build_only {
            Self {
                configure: true,
                build: true,
                ..Self::NONE
            }
        } else {
            Self::ALL
        }
    }
}

impl Cli {
    /// Stages selected by the phase flags.
    pub fn tasks(&self) -> Tasks {
        Tasks::from(self.phases)
    }

    /// Build the run configuration, resolving relative paths against the
    /// source directory (itself resolved against `cwd`).
    pub fn run_config(&self, cwd: &Path) -> RunConfig {
        let source_dir = match &self.source_dir {
            Some(dir) => resolve_relative(cwd, dir),
            None => cwd.to_path_buf(),
        };

        let mut config = RunConfig::new(&source_dir)
            .with_build_dir(&self.build_dir)
            .with_settings_file(&self.config_file)
            .with_custom_port_dir(&self.custom_port_dir)
            .with_tool_dir(&self.vcpkg_dir);
        config.build_type = self.build_type;
        if let Some(triplet) = &self.triplet {
            config.triplet = triplet.clone();
        }
        config.cmake_binary.clone_from(&self.cmake_binary);
        config.tool_url.clone_from(&self.vcpkg_url);
        config.verbose = self.verbose;
        config
    }

    /// [`Cli::run_config`] against the process working directory.
    ///
    /// # Errors
    ///
    /// Fails if the working directory cannot be read.
    pub fn run_config_from_env(&self) -> Result<RunConfig> {
        let cwd = std::env::current_dir().context("Failed to read the current directory")?;
        Ok(self.run_config(&cwd))
    }
}
