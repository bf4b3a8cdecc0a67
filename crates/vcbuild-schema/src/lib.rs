//! Shared value types for vcbuild: package names, triplets, build types and
//! the project settings file.

pub mod settings;
pub mod triplet;
pub mod types;

// Re-exports
pub use settings::{ProjectSettings, SettingsError};
pub use triplet::Triplet;
pub use types::*;

/// Default settings file name, relative to the source directory.
pub const DEFAULT_SETTINGS_FILE: &str = ".build-py";

/// Default location of locally-authored ports, relative to the source directory.
pub const DEFAULT_CUSTOM_PORT_DIR: &str = "extern/vcpkg/ports/";
