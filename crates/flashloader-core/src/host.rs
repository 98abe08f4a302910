//! Loader host collaborator
//!
//! The menu around the loader owns the file listing and the ability to
//! jump into a freshly written image. The engine only notifies it.

/// Callbacks into the surrounding loader UI
pub trait LoaderHost {
    /// Re-read the file listing from storage
    fn refresh_file_listing(&mut self);

    /// Select the entry with the given name in the listing
    fn select_entry(&mut self, name: &str);

    /// Start executing the image that was just written to flash
    fn switch_execution(&mut self);
}

/// Host that ignores every notification
pub struct NoHost;

impl LoaderHost for NoHost {
    fn refresh_file_listing(&mut self) {}
    fn select_entry(&mut self, _name: &str) {}
    fn switch_execution(&mut self) {}
}
