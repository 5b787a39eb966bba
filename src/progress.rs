//! Per-phase progress reporting.
//!
//! Each pipeline phase owns a [`Phase`]: an indicatif bar (known length) or
//! spinner (open-ended) on a terminal, or, with `--log-only`, periodic
//! `[phase] n/total` lines through `tracing` with the bar hidden.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Switch every phase created afterwards to log-only output.
pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

const BAR_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})";
const SPINNER_TEMPLATE: &str = "{msg} {spinner} [{elapsed_precise}]";

/// Items between log-only progress lines unless overridden
pub const DEFAULT_LOG_EVERY: u64 = 50_000;

/// Progress of one pipeline phase. `tick` may be called from rayon workers.
pub struct Phase {
    name: &'static str,
    bar: ProgressBar,
    total: Option<u64>,
    done: AtomicU64,
    log_every: u64,
}

impl Phase {
    /// Phase over a known number of items.
    pub fn counted(name: &'static str, label: &str, total: u64) -> Self {
        let bar = ProgressBar::new(total);
        if !log_only() {
            if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
                bar.set_style(style.progress_chars("=> "));
            }
        }
        Self::build(name, label, bar, Some(total))
    }

    /// Phase whose length is not known up front.
    pub fn open_ended(name: &'static str, label: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if !log_only() {
            if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        Self::build(name, label, bar, None)
    }

    fn build(name: &'static str, label: &str, bar: ProgressBar, total: Option<u64>) -> Self {
        if log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_message(label.to_string());
        Self {
            name,
            bar,
            total,
            done: AtomicU64::new(0),
            log_every: DEFAULT_LOG_EVERY,
        }
    }

    pub fn log_every(mut self, items: u64) -> Self {
        self.log_every = items.max(1);
        self
    }

    /// Count one item.
    pub fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        self.bar.inc(1);
        if log_only() {
            if let Some(line) = self.progress_line(done) {
                tracing::info!("{}", line);
            }
        }
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn set_label(&self, label: String) {
        self.bar.set_message(label);
    }

    /// The log-only line due after `done` items, if any.
    fn progress_line(&self, done: u64) -> Option<String> {
        match self.total {
            Some(total) if done % self.log_every == 0 || done == total => {
                let pct = if total == 0 {
                    100.0
                } else {
                    100.0 * done as f64 / total as f64
                };
                Some(format!("[{}] {}/{} ({:.1}%)", self.name, done, total, pct))
            }
            None if done % self.log_every == 0 => Some(format!("[{}] {}", self.name, done)),
            _ => None,
        }
    }

    /// End the phase with a summary line. A hidden bar drops its message, so
    /// log-only mode logs it.
    pub fn finish(self, summary: String) {
        if log_only() {
            tracing::info!("[{}] {}", self.name, summary);
        }
        self.bar.finish_with_message(summary);
    }
}
