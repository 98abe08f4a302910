//! Progress and error reporting
//!
//! Long-running operations report their state through a [`ProgressReporter`].
//! On the device this is an on-screen progress bar; on a host it may be a
//! terminal progress bar or nothing at all ([`NoProgress`]).

use core::fmt::Write;

use crate::error::Error;

/// Callback for progress reporting during transfers and installs
pub trait ProgressReporter {
    /// Start a new progress phase with the given label and total
    fn show(&mut self, label: &str, total: u32);

    /// Update the current position within the phase
    fn update(&mut self, current: u32);

    /// Hide the progress display
    fn hide(&mut self);

    /// Surface an error to the user
    ///
    /// The default renders the numeric error code as a progress label.
    fn error(&mut self, error: &Error) {
        let mut label: heapless::String<16> = heapless::String::new();
        // "error 255" always fits
        let _ = write!(label, "error {}", error.code());
        self.show(&label, 1);
    }
}

/// A no-op progress reporter
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn show(&mut self, _label: &str, _total: u32) {}
    fn update(&mut self, _current: u32) {}
    fn hide(&mut self) {}
    fn error(&mut self, _error: &Error) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use std::vec::Vec;

    #[derive(Default)]
    struct Labels(Vec<(String, u32)>);

    impl ProgressReporter for Labels {
        fn show(&mut self, label: &str, total: u32) {
            self.0.push((label.into(), total));
        }
        fn update(&mut self, _current: u32) {}
        fn hide(&mut self) {}
    }

    #[test]
    fn test_default_error_shows_code() {
        let mut labels = Labels::default();
        labels.error(&Error::OpenFailed);
        assert_eq!(labels.0, [(String::from("error 1"), 1)]);
    }
}
