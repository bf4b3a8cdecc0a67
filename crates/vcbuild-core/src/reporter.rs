//! Reporter trait for dependency injection
//!
//! The engine reports progress through this trait so it stays independent of
//! how (or whether) the progress is rendered.

/// Sink for user-facing progress.
///
/// Work is announced as a *phase*: [`Reporter::live_phase`] opens a line with
/// a title, and [`Reporter::live_phase_update`] closes it with a short status
/// word. Phases never nest.
pub trait Reporter: Send + Sync {
    /// Open a phase line (e.g. "Installing zlib[core]").
    fn live_phase(&self, title: &str);

    /// Close the open phase with a status (e.g. "Installed").
    fn live_phase_update(&self, status: &str, success: bool);

    /// Start a new group of phases (e.g. "Packages").
    fn section(&self, title: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn live_phase(&self, title: &str) {
        (**self).live_phase(title);
    }
    fn live_phase_update(&self, status: &str, success: bool) {
        (**self).live_phase_update(status, success);
    }
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// A no-op reporter for silent operations (e.g. tests).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn live_phase(&self, _: &str) {}
    fn live_phase_update(&self, _: &str, _: bool) {}
    fn section(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}

/// Run `work` inside a phase.
///
/// On success the phase is closed with whatever status `work` produced. On
/// failure it is closed with the error's status word before the error is
/// returned, so the console never shows a dangling phase line.
///
/// # Errors
///
/// Returns whatever `work` returns.
pub fn run_phase<T, F>(
    reporter: &dyn Reporter,
    title: &str,
    work: F,
) -> Result<T, crate::EngineError>
where
    F: FnOnce() -> Result<(T, String), crate::EngineError>,
{
    reporter.live_phase(title);
    match work() {
        Ok((value, status)) => {
            reporter.live_phase_update(&status, true);
            Ok(value)
        }
        Err(err) => {
            reporter.live_phase_update(err.status_word(), false);
            Err(err)
        }
    }
}

/// `"1 dependency"`, `"3 dependencies"`.
pub fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}
