//! Progress indicators
//!
//! Spinners for backend calls and position fixes, and a countdown for the
//! post-submit confirmation window.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or(fallback)
}

/// Create a spinner for an awaited backend call or location fix
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        style("{spinner:.blue} {msg}", ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Create a bar counting down the confirmation window, one tick per second
pub fn countdown(secs: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(secs);
    pb.set_style(
        style("{msg} [{bar:20.green/white}] {pos}/{len}s", ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Finish a progress bar with a success message
pub fn finish_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✓ {}", message));
}

/// Finish a progress bar with an error message
pub fn finish_error(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✗ {}", message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_creation() {
        let pb = spinner("Locating…");
        finish_success(&pb, "fix acquired");
        assert!(pb.is_finished());
    }

    #[test]
    fn test_countdown_length() {
        let pb = countdown(3, "Checked in");
        assert_eq!(pb.length(), Some(3));
        pb.inc(3);
        finish_error(&pb, "done");
    }
}
