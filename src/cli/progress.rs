//! Console output for CLI runs.

use std::sync::Mutex;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::engine::Reporter;
use crate::format::render_table;

/// Creates the per-record progress bar.
fn make_progress_bar(label: &str, total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{prefix}  [{bar:40.cyan/blue}] {pos}/{len} {percent}% {elapsed_precise}",
    ) {
        bar.set_style(style.progress_chars("━━╌"));
    }
    bar.set_prefix(label.to_string());
    bar
}

/// Reporter that writes lines to stdout, warnings to stderr and draws an
/// indicatif bar while records are processed.
#[derive(Default)]
pub struct ConsoleReporter {
    bar: Mutex<Option<ProgressBar>>,
    quiet_bar: bool,
}

impl ConsoleReporter {
    /// Creates a reporter that draws its progress bar on stderr.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reporter without a visible progress bar.
    #[must_use]
    pub fn without_progress_bar() -> Self {
        Self {
            bar: Mutex::new(None),
            quiet_bar: true,
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock()
            && let Some(bar) = guard.as_ref()
        {
            f(bar);
        }
    }
}

impl Reporter for ConsoleReporter {
    fn line(&self, message: &str) {
        println!("{message}");
    }

    fn warning(&self, message: &str) {
        eprintln!("{} {message}", style("Warning:").yellow().bold());
    }

    fn progress_start(&self, label: &str, total: u64) {
        let bar = make_progress_bar(label, total);
        if self.quiet_bar {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn progress_tick(&self) {
        self.with_bar(|bar| bar.inc(1));
    }

    fn progress_finish(&self) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(bar) = guard.take()
        {
            bar.finish();
        }
    }

    fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        println!("{}", render_table(headers, rows));
    }
}

/// The single line a fatal error is reported with.
#[must_use]
pub fn error_line(error: &crate::Error) -> String {
    format!("{} {error}", style("Error:").red().bold())
}

/// Prints a fatal error the way the binary reports it.
pub fn print_error(error: &crate::Error) {
    eprintln!("{}", error_line(error));
}
