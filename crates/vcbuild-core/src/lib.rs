//! vcbuild core: drives vcpkg to bring a project's native dependencies up to
//! date, then hands the result to CMake.
//!
//! The engine is synchronous. Every tool call blocks until the subprocess
//! exits, and every failure comes back as an [`EngineError`].

pub mod bootstrap;
pub mod cmake;
pub mod config;
pub mod error;
pub mod installer;
pub mod paths;
pub mod ports;
pub mod process;
pub mod reporter;
pub mod resolver;
pub mod scrape;

// Re-exports
pub use config::RunConfig;
pub use error::{BuildLog, EngineError};
pub use installer::{Installer, SyncReport};
pub use process::{PackageTool, ToolOutput, Vcpkg};
pub use reporter::{NullReporter, Reporter};
pub use resolver::{DependencyGraph, PackageNode, Resolution, resolve};
