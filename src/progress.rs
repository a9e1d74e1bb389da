//! Progress reporting.
//!
//! The core reports `(current, total)` after every processed record through
//! a [`ProgressSink`]. The binary runs the core on a worker thread and uses a
//! [`ChannelProgress`] to hand those reports to the thread that owns the
//! progress bar; log-only mode hides the bar for tail-friendly output.

use crossbeam_channel::Sender;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Receives `(current, total)` once per processed record.
pub trait ProgressSink {
    fn report(&self, current: usize, total: usize);
}

/// Discards all progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _current: usize, _total: usize) {}
}

/// Forwards progress to another thread. A closed receiver is ignored.
#[derive(Clone)]
pub struct ChannelProgress {
    tx: Sender<(usize, usize)>,
}

impl ChannelProgress {
    pub fn new(tx: Sender<(usize, usize)>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, current: usize, total: usize) {
        let _ = self.tx.send((current, total));
    }
}

/// Terminal progress: an indicatif bar, or periodic log lines in log-only mode.
pub struct ConsoleProgress {
    bar: ProgressBar,
    log_only: bool,
    interval: usize,
}

impl ConsoleProgress {
    pub fn new(msg: &str, log_only: bool) -> Self {
        Self {
            bar: create_progress_bar(0, msg, log_only),
            log_only,
            interval: 500,
        }
    }

    pub fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    /// Run `f` with the bar hidden, so printed lines do not tear it.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }
}

impl ProgressSink for ConsoleProgress {
    fn report(&self, current: usize, total: usize) {
        if self.bar.length() != Some(total as u64) {
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(current as u64);
        if self.log_only {
            log_progress("Processing comics", current, total, self.interval);
        }
    }
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

/// Create a progress bar with consistent styling.
/// In log-only mode, the progress bar is hidden.
pub fn create_progress_bar(len: u64, msg: &str, log_only: bool) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if log_only {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
    }
    pb.set_message(msg.to_string());
    pb
}

/// Log progress at fixed intervals for tail-friendly output.
pub fn log_progress(phase: &str, current: usize, total: usize, interval: usize) {
    if total == 0 {
        return;
    }
    if current % interval.max(1) == 0 || current == total {
        let pct = 100.0 * current as f64 / total as f64;
        tracing::info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
    }
}
