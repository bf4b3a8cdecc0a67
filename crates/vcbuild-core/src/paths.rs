//! Path resolution and the vcpkg checkout layout.
//!
//! Command-line paths are resolved against the source directory without
//! touching the filesystem. The remaining helpers name the files and folders
//! inside a tool directory.

use std::path::{Component, Path, PathBuf};

use crate::process::tool_exe_name;

/// Resolve `path` against `base` unless it is already absolute, then fold
/// away `.` and `..` components lexically (no filesystem access).
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    normalize_lexically(&base.join(path))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// vcpkg executable inside a tool checkout: `<tool_dir>/vcpkg[.exe]`
pub fn tool_exe(tool_dir: &Path) -> PathBuf {
    tool_dir.join(tool_exe_name())
}

/// CMake toolchain file: `<tool_dir>/scripts/buildsystems/vcpkg.cmake`
pub fn toolchain_file(tool_dir: &Path) -> PathBuf {
    tool_dir.join("scripts").join("buildsystems").join("vcpkg.cmake")
}

/// Port recipes: `<tool_dir>/ports`
pub fn ports_dir(tool_dir: &Path) -> PathBuf {
    tool_dir.join("ports")
}

/// Per-port build logs: `<tool_dir>/buildtrees/<port>`
pub fn buildtree_dir(tool_dir: &Path, port: &str) -> PathBuf {
    tool_dir.join("buildtrees").join(port)
}
