//! Terminal progress display

use flashloader_core::progress::ProgressReporter;
use flashloader_core::Error;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress reporter using indicatif progress bars
///
/// Each `show` starts a fresh bar labelled with the phase.
#[derive(Default)]
pub struct IndicatifProgress {
    bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn style(label: &str) -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }
}

impl ProgressReporter for IndicatifProgress {
    fn show(&mut self, label: &str, total: u32) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        let bar = ProgressBar::new(u64::from(total));
        bar.set_style(Self::style(label));
        self.bar = Some(bar);
    }

    fn update(&mut self, current: u32) {
        if let Some(bar) = &self.bar {
            bar.set_position(u64::from(current));
        }
    }

    fn hide(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn error(&mut self, error: &Error) {
        match self.bar.take() {
            Some(bar) => bar.abandon_with_message(format!("error {}: {}", error.code(), error)),
            None => eprintln!("error {}: {}", error.code(), error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_lifecycle() {
        let mut progress = IndicatifProgress::new();
        progress.update(5);
        progress.show("Flashing...", 10);
        progress.update(7);
        assert_eq!(progress.bar.as_ref().map(|b| b.position()), Some(7));
        progress.show("Copying...", 20);
        assert_eq!(progress.bar.as_ref().and_then(|b| b.length()), Some(20));
        progress.hide();
        assert!(progress.bar.is_none());
        progress.error(&Error::IoFailed);
    }
}
