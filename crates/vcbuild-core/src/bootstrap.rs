//! Fetching and bootstrapping the vcpkg checkout.
//!
//! The checkout is considered present when its marker files exist. If it is
//! missing, the repository archive is downloaded and only its top-level
//! `vcpkg-master/` folder is unpacked into the tool directory. Bootstrapping
//! (building the `vcpkg` executable) is skipped when the executable is already
//! there.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tempfile::NamedTempFile;
use zip::ZipArchive;

use crate::EngineError;
use crate::paths::tool_exe;
use crate::process::{render_command, run_captured};
use crate::reporter::{Reporter, run_phase};

/// Files whose presence marks a usable checkout.
pub const TOOL_MARKERS: &[&str] = &[".vcpkg-root", "bootstrap-vcpkg.sh", "bootstrap-vcpkg.bat"];

/// Archive path appended to the repository URL.
pub const ARCHIVE_PATH: &str = "archive/master.zip";

/// Folder inside the archive that holds the checkout.
pub const ARCHIVE_SUBDIR: &str = "vcpkg-master/";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether every marker file exists in `dir`.
pub fn check_tool_dir(dir: &Path) -> bool {
    TOOL_MARKERS.iter().all(|marker| dir.join(marker).is_file())
}

/// Unpack the entries under `subdir` into `dest`, dropping the prefix.
///
/// Entries outside `subdir` and entries whose names escape the archive root
/// are skipped. Returns the number of files written.
///
/// # Errors
///
/// Returns [`EngineError::Archive`] for a corrupt archive and
/// [`EngineError::Io`] if a file cannot be written.
pub fn extract_subdir<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    dest: &Path,
    subdir: &str,
) -> Result<usize, EngineError> {
    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "skipping unsafe archive entry");
            continue;
        };
        let Ok(relative) = name.strip_prefix(subdir) else {
            continue;
        };

        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| EngineError::io(&target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| EngineError::io(&target, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                .map_err(|e| EngineError::io(&target, e))?;
        }
        written += 1;
    }
    Ok(written)
}

fn fetch(url: &str, into: &mut File) -> Result<u64, EngineError> {
    let download_err = |e: reqwest::Error| EngineError::Download {
        url: url.to_string(),
        message: e.to_string(),
    };

    let client = reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None)
        .build()
        .map_err(download_err)?;
    let mut response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(download_err)?;

    response.copy_to(into).map_err(download_err)
}

/// Download `url` into a fresh temporary file under `dir`. The file is
/// deleted when the returned handle drops, including on a failed download.
fn fetch_archive(url: &str, dir: &Path) -> Result<NamedTempFile, EngineError> {
    let mut archive = tempfile::Builder::new()
        .prefix("vcbuild-vcpkg-")
        .suffix(".zip")
        .tempfile_in(dir)
        .map_err(|e| EngineError::io(dir, e))?;
    let bytes = fetch(url, archive.as_file_mut())?;
    tracing::debug!(bytes, path = %archive.path().display(), "downloaded tool archive");
    Ok(archive)
}

/// Download the repository archive from `url` and unpack it into `dir`.
///
/// # Errors
///
/// Fails if the download or extraction fails, or if `dir` still lacks a
/// marker file afterwards.
pub fn download_tool(dir: &Path, url: &str, reporter: &dyn Reporter) -> Result<(), EngineError> {
    let full_url = format!("{}/{ARCHIVE_PATH}", url.trim_end_matches('/'));

    let archive = run_phase(reporter, &format!("Downloading vcpkg from {full_url}"), || {
        let archive = fetch_archive(&full_url, &std::env::temp_dir())?;
        Ok((archive, "Finished".to_string()))
    })?;

    run_phase(reporter, &format!("Extracting into {}", dir.display()), || {
        let file = archive
            .reopen()
            .map_err(|e| EngineError::io(archive.path(), e))?;
        let mut zip = ZipArchive::new(file)?;
        let written = extract_subdir(&mut zip, dir, ARCHIVE_SUBDIR)?;
        tracing::debug!(written, "extracted tool archive");
        if !check_tool_dir(dir) {
            return Err(EngineError::ToolIncomplete(dir.to_path_buf()));
        }
        Ok(((), "Finished".to_string()))
    })
}

fn bootstrap_command(dir: &Path) -> (Command, String) {
    let (program, script) = if cfg!(windows) {
        ("cmd", dir.join("bootstrap-vcpkg.bat"))
    } else {
        ("bash", dir.join("bootstrap-vcpkg.sh"))
    };
    let mut cmd = Command::new(program);
    if cfg!(windows) {
        cmd.arg("/C");
    }
    cmd.arg(&script).current_dir(dir);

    let script = script.to_string_lossy().into_owned();
    (cmd, render_command(Path::new(program), &[script.as_str()]))
}

/// Build the vcpkg executable unless it already exists. Returns `true` when
/// the cached executable was used.
///
/// # Errors
///
/// Returns [`EngineError::CommandFailed`] with the script's output if
/// bootstrapping exits non-zero.
pub fn bootstrap_tool(dir: &Path, reporter: &dyn Reporter) -> Result<bool, EngineError> {
    run_phase(reporter, "Bootstrapping vcpkg (this may take some time)", || {
        if tool_exe(dir).is_file() {
            return Ok((true, "Cached".to_string()));
        }

        let (mut cmd, rendered) = bootstrap_command(dir);
        let output = run_captured(&mut cmd, rendered)?;
        if !output.success() {
            return Err(EngineError::command_failed(&output));
        }
        Ok((false, "Ok".to_string()))
    })
}

/// Make sure `dir` holds a bootstrapped checkout, downloading it from `url`
/// if needed.
///
/// # Errors
///
/// Propagates download and bootstrap failures.
pub fn prepare_tool(dir: &Path, url: &str, reporter: &dyn Reporter) -> Result<(), EngineError> {
    reporter.live_phase(&format!("Checking for vcpkg in {}", dir.display()));
    let present = check_tool_dir(dir);
    reporter.live_phase_update(if present { "Ok" } else { "Failed" }, present);

    if !present {
        download_tool(dir, url, reporter)?;
    }
    bootstrap_tool(dir, reporter)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
        }
        ZipArchive::new(writer.finish().unwrap()).unwrap()
    }

    fn seed_markers(dir: &Path) {
        for marker in TOOL_MARKERS {
            fs::write(dir.join(marker), "").unwrap();
        }
    }

    #[test]
    fn test_check_requires_every_marker() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!check_tool_dir(dir.path()));

        fs::write(dir.path().join(".vcpkg-root"), "").unwrap();
        assert!(!check_tool_dir(dir.path()));

        seed_markers(dir.path());
        assert!(check_tool_dir(dir.path()));
    }

    #[test]
    fn test_extract_strips_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let mut zip = archive(&[
            ("vcpkg-master/", ""),
            ("vcpkg-master/.vcpkg-root", ""),
            ("vcpkg-master/bootstrap-vcpkg.sh", "#!/bin/sh"),
            ("vcpkg-master/bootstrap-vcpkg.bat", "@echo off"),
            ("vcpkg-master/ports/zlib/portfile.cmake", "zlib"),
            ("README.md", "outside"),
        ]);

        let written = extract_subdir(&mut zip, dir.path(), ARCHIVE_SUBDIR).unwrap();
        assert_eq!(written, 4);
        assert!(check_tool_dir(dir.path()));
        assert_eq!(
            fs::read_to_string(dir.path().join("ports/zlib/portfile.cmake")).unwrap(),
            "zlib"
        );
        assert!(!dir.path().join("README.md").exists());
    }

    #[test]
    fn test_bootstrap_uses_cached_executable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(tool_exe(dir.path()), "").unwrap();
        assert!(bootstrap_tool(dir.path(), &NullReporter).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_bootstrap_runs_script_in_tool_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bootstrap-vcpkg.sh"), "touch vcpkg\n").unwrap();

        assert!(!bootstrap_tool(dir.path(), &NullReporter).unwrap());
        assert!(tool_exe(dir.path()).is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_bootstrap_failure_keeps_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("bootstrap-vcpkg.sh"),
            "echo building\necho 'no compiler' >&2\nexit 3\n",
        )
        .unwrap();

        match bootstrap_tool(dir.path(), &NullReporter).unwrap_err() {
            EngineError::CommandFailed {
                status,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(status, Some(3));
                assert_eq!(stdout, "building\n");
                assert_eq!(stderr, "no compiler\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Serve one response that promises more bytes than it sends.
    fn serve_truncated() -> String {
        use std::io::{BufRead, BufReader};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 2 {
                line.clear();
            }
            let mut stream = reader.into_inner();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\n0123456789")
                .unwrap();
        });
        format!("http://{addr}/{ARCHIVE_PATH}")
    }

    #[test]
    fn test_truncated_download_leaves_no_file() {
        let url = serve_truncated();
        let scratch = tempfile::tempdir().unwrap();

        let err = fetch_archive(&url, scratch.path()).unwrap_err();
        assert!(matches!(err, EngineError::Download { .. }), "{err}");
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_prepare_skips_download_when_present() {
        let dir = tempfile::tempdir().unwrap();
        seed_markers(dir.path());
        fs::write(tool_exe(dir.path()), "").unwrap();

        // An unreachable URL proves nothing was fetched.
        prepare_tool(dir.path(), "http://127.0.0.1:9", &NullReporter).unwrap();
    }
}
