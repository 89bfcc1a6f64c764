use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

/// Terminal progress for long batch jobs. A hidden reporter ignores every call.
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Bar counting `total` items, labelled with `unit` (`records`, `files`).
    pub fn new(total: u64, unit: &str, message: &str) -> Self {
        let bar = ProgressBar::new(total);
        let template = format!(
            "{{msg}}\n{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {}",
            unit
        );
        bar.set_style(
            ProgressStyle::default_bar()
                .template(&template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self::start(bar, message)
    }

    /// Open-ended spinner for work of unknown size, such as reading inputs.
    pub fn spinner(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self::start(bar, message)
    }

    pub fn hidden() -> Self {
        Self { bar: None }
    }

    fn start(bar: ProgressBar, message: &str) -> Self {
        bar.set_message(message.to_string());
        bar.enable_steady_tick(TICK);
        Self { bar: Some(bar) }
    }

    pub fn increment(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn finish_with_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_reporter_ignores_updates() {
        let progress = ProgressReporter::hidden();
        progress.increment(5);
        progress.set_message("ignored");
        progress.finish_with_message("done");
    }
}
