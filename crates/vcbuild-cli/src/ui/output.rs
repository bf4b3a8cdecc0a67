//! Console reporter and fatal-error dump.
//!
//! A phase prints as `\t<title>... ` and is completed on the same line with a
//! colored status and the elapsed time:
//!
//! ```text
//!     Installing package zlib[core]... Installed  (12.31s)
//! ```

use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crossterm::style::Stylize;

use vcbuild_core::{EngineError, Reporter};

/// Prints phases to stdout, messages to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    phase_started: Mutex<Option<Instant>>,
}

impl ConsoleReporter {
    /// Create a reporter with no open phase.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for ConsoleReporter {
    fn live_phase(&self, title: &str) {
        *self
            .phase_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        print!("\t{title}... ");
        let _ = std::io::stdout().flush();
    }

    fn live_phase_update(&self, status: &str, success: bool) {
        let started = self
            .phase_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let elapsed = started.map_or(0.0, |t| t.elapsed().as_secs_f64());
        let status = if success {
            status.green().bold()
        } else {
            status.red().bold()
        };
        println!("{status}  ({elapsed:.2}s)");
    }

    fn section(&self, title: &str) {
        println!();
        println!("{}", title.bold());
    }

    fn info(&self, msg: &str) {
        println!("{msg}");
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {msg}", "warning:".yellow().bold());
    }

    fn error(&self, msg: &str) {
        eprintln!("{} {msg}", "error:".red().bold());
    }
}

/// `==== title ====` followed by the block, as printed for fatal errors.
pub fn format_block(title: &str, body: &str) -> String {
    let mut out = format!("============= {title} =============\n{body}");
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Print everything known about a fatal error: captured tool output and
/// build logs first, then the error chain.
pub fn print_fatal(err: &anyhow::Error) {
    if let Some(engine) = err.downcast_ref::<EngineError>() {
        let mut stdout = std::io::stdout().lock();
        for (title, body) in engine.diagnostics() {
            let _ = stdout.write_all(format_block(&title, &body).as_bytes());
        }
        let _ = stdout.flush();
    }
    eprintln!("{} {err:#}", "error:".red().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_block_terminates_body() {
        assert_eq!(
            format_block("stdout", "line"),
            "============= stdout =============\nline\n"
        );
        assert_eq!(
            format_block("stderr", "line\n"),
            "============= stderr =============\nline\n"
        );
    }

    #[test]
    fn test_update_without_phase_does_not_panic() {
        let reporter = ConsoleReporter::new();
        reporter.live_phase_update("Ok", true);
    }
}
