//! Custom port mirror.
//!
//! A project can carry its own port recipes (`extern/vcpkg/ports/<name>/`).
//! Before anything is resolved, each one is copied into the tool's
//! `ports/<name>/`, replacing only files the source has a newer copy of.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use walkdir::WalkDir;

use crate::EngineError;
use crate::paths::ports_dir;
use crate::reporter::{Reporter, plural, run_phase};

/// Extensions of files that another process may hold open (and lock) while
/// running: executables, shared and static libraries, debug databases.
const BINARY_ARTIFACT_EXTENSIONS: &[&str] = &["exe", "dll", "so", "dylib", "lib", "a", "pdb"];

/// Names of the immediate subdirectories of `dir`, sorted.
///
/// Returns `Ok(None)` if `dir` does not exist or is not a directory.
///
/// # Errors
///
/// Returns [`EngineError::Io`] if `dir` exists but cannot be listed.
pub fn enumerate_ports(dir: &Path) -> Result<Option<Vec<String>>, EngineError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let entries = fs::read_dir(dir).map_err(|e| EngineError::io(dir, e))?;

    let mut ports = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(dir, e))?;
        if entry.path().is_dir() {
            ports.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    ports.sort();
    Ok(Some(ports))
}

/// Copy every port under `custom_dir` into `<tool_dir>/ports/`.
///
/// A missing `custom_dir` is reported and skipped. Returns the names of the
/// ports mirrored.
///
/// # Errors
///
/// Fails on the first file that cannot be copied.
pub fn mirror_ports(
    custom_dir: &Path,
    tool_dir: &Path,
    reporter: &dyn Reporter,
) -> Result<Vec<String>, EngineError> {
    reporter.live_phase("Enumerating ports");
    let ports = match enumerate_ports(custom_dir) {
        Ok(Some(ports)) => {
            reporter.live_phase_update(&format!("Found {}", plural(ports.len(), "port", "ports")), true);
            ports
        }
        Ok(None) => {
            reporter.live_phase_update("Folder not found", false);
            return Ok(Vec::new());
        }
        Err(e) => {
            reporter.live_phase_update(e.status_word(), false);
            return Err(e);
        }
    };

    let dest_root = ports_dir(tool_dir);
    for name in &ports {
        run_phase(reporter, &format!("Copying {name} port"), || {
            let copied = copy_tree_if_newer(&custom_dir.join(name), &dest_root.join(name))?;
            tracing::debug!(port = %name, copied, "mirrored port");
            Ok(((), "Ok".to_string()))
        })?;
    }
    Ok(ports)
}

/// Recursively copy `src` into `dst`, creating directories as needed and
/// replacing a file only when it is missing or older than its source.
///
/// Returns the number of files written.
///
/// # Errors
///
/// Returns [`EngineError::ArtifactInUse`] when a locked binary blocks the
/// copy, [`EngineError::Io`] for anything else.
pub fn copy_tree_if_newer(src: &Path, dst: &Path) -> Result<usize, EngineError> {
    fs::create_dir_all(dst).map_err(|e| EngineError::io(dst, e))?;

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            EngineError::io(path, e.into())
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| EngineError::io(entry.path(), std::io::Error::other(e)))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| classify_replace_error(&target, e))?;
        } else if needs_update(entry.path(), &target)? {
            fs::copy(entry.path(), &target).map_err(|e| classify_replace_error(&target, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn needs_update(src: &Path, dst: &Path) -> Result<bool, EngineError> {
    let dst_meta = match fs::metadata(dst) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(EngineError::io(dst, e)),
    };
    let src_meta = fs::metadata(src).map_err(|e| EngineError::io(src, e))?;

    match (src_meta.modified(), dst_meta.modified()) {
        (Ok(src_time), Ok(dst_time)) => Ok(src_time > dst_time),
        // No timestamps on this platform: always refresh.
        _ => Ok(true),
    }
}

/// Turn a failure to replace `path` into the matching [`EngineError`].
///
/// Permission errors on binary artifacts almost always mean a running program
/// holds the file, so they get their own message.
pub fn classify_replace_error(path: &Path, err: std::io::Error) -> EngineError {
    let is_artifact = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            BINARY_ARTIFACT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        });

    if err.kind() == ErrorKind::PermissionDenied && is_artifact {
        EngineError::ArtifactInUse {
            path: path.to_path_buf(),
        }
    } else {
        EngineError::io(path, err)
    }
}
