//! Terminal progress for transfer runs

use coldsync_types::{Error, ProgressReporter, TransferTask};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Progress bar driven by executor events
pub struct CliProgress {
    bar: ProgressBar,
    bytes: AtomicU64,
    visible: bool,
}

impl CliProgress {
    /// Create a reporter; a hidden one swallows every event
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(0);
            if let Ok(bar_style) = ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
            {
                bar.set_style(bar_style.progress_chars("█▉▊▋▌▍▎▏  "));
            }
            bar.set_message("Planning...");
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            bar,
            bytes: AtomicU64::new(0),
            visible,
        }
    }

    /// Clear the bar before the summary is printed
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn report_planned(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_message("Transferring");
    }

    fn report_started(&self, task: &TransferTask) {
        self.bar.set_message(task.logical_path.to_string());
    }

    fn report_completed(&self, _task: &TransferTask, bytes: u64) {
        let total = self.bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.bar.inc(1);
        self.bar
            .set_message(format!("{} moved", crate::display::format_bytes(total)));
    }

    fn report_failed(&self, task: &TransferTask, err: &Error) {
        self.bar.inc(1);
        if self.visible {
            self.bar.suspend(|| {
                eprintln!(
                    "{} {}: {}",
                    style("✗").red().bold(),
                    style(&task.logical_path).cyan(),
                    style(err).red()
                );
            });
        }
    }
}
