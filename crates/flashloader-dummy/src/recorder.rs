//! Recording progress reporter and loader host

use flashloader_core::error::Error;
use flashloader_core::host::LoaderHost;
use flashloader_core::progress::ProgressReporter;

/// A notification captured by [`Recorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `ProgressReporter::show`
    Show(String, u32),
    /// `ProgressReporter::update`
    Update(u32),
    /// `ProgressReporter::hide`
    Hide,
    /// `ProgressReporter::error`
    Error(Error),
    /// `LoaderHost::refresh_file_listing`
    Refresh,
    /// `LoaderHost::select_entry`
    Select(String),
    /// `LoaderHost::switch_execution`
    Switch,
}

/// Records every progress and host notification in order
#[derive(Debug, Default)]
pub struct Recorder {
    events: Vec<Event>,
}

impl Recorder {
    /// All events seen so far
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Positions passed to `update`, in order
    pub fn updates(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Update(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded so far
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl ProgressReporter for Recorder {
    fn show(&mut self, label: &str, total: u32) {
        self.events.push(Event::Show(label.to_string(), total));
    }

    fn update(&mut self, current: u32) {
        self.events.push(Event::Update(current));
    }

    fn hide(&mut self) {
        self.events.push(Event::Hide);
    }

    fn error(&mut self, error: &Error) {
        self.events.push(Event::Error(*error));
    }
}

impl LoaderHost for Recorder {
    fn refresh_file_listing(&mut self) {
        self.events.push(Event::Refresh);
    }

    fn select_entry(&mut self, name: &str) {
        self.events.push(Event::Select(name.to_string()));
    }

    fn switch_execution(&mut self) {
        self.events.push(Event::Switch);
    }
}
