//! Spinner shown while waiting on the oracle or the search backend

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A terminal spinner; a no-op when disabled
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn start(message: impl Into<String>, enabled: bool) -> Self {
        if !enabled {
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Stop and erase the spinner
    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_spinner_is_noop() {
        let spinner = Spinner::start("Thinking...", false);
        assert!(spinner.bar.is_none());
        spinner.finish();
    }

    #[test]
    fn test_enabled_spinner_finishes() {
        let spinner = Spinner::start("Thinking...", true);
        assert!(spinner.bar.is_some());
        spinner.finish();
    }
}
