//! Console output.

pub mod output;

pub use output::{ConsoleReporter, print_fatal};
