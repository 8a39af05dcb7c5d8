//! Terminal output for long passes: `indicatif` bars over the games being
//! scraped or refreshed, and the `tracing` subscriber.
//!
//! With `--log-only` the bars are never drawn; instead every
//! [`LOG_EVERY`] games a `[phase] n/total (pct%)` line goes to the log,
//! which reads better when output is redirected to a file.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Games between two progress lines in log-only mode
pub const LOG_EVERY: u64 = 25;

/// Set once from `--log-only` before any pass starts
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Stderr subscriber; `RUST_LOG` overrides `steam_completionist=info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("steam_completionist=info"));
    // Already installed (tests) is fine
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// "4.2s" under a minute, "1.5m" above
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Bar counting games for one pass; hidden in log-only mode.
pub fn create_progress_bar(games: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(games);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} games ({per_sec}, ETA: {eta})")
                .unwrap()
                .progress_chars("=> "),
        );
    }
    pb.set_message(msg.to_string());
    pb
}

/// Emit the log-only progress line when `done` hits the interval or the end
pub fn log_progress(phase: &str, done: u64, total: u64, interval: u64) {
    if total == 0 || interval == 0 || !is_log_only() {
        return;
    }
    if done % interval == 0 || done == total {
        let pct = 100.0 * done as f64 / total as f64;
        tracing::info!("[{}] {}/{} ({:.1}%)", phase, done, total, pct);
    }
}

/// One game finished, whatever its outcome
pub fn tick(pb: &ProgressBar, phase: &str) {
    pb.inc(1);
    log_progress(phase, pb.position(), pb.length().unwrap_or(0), LOG_EVERY);
}

/// Spinner for a single request of unknown duration (the ownership list)
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg} {spinner} [{elapsed_precise}]")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}
