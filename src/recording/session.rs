//! User-controlled recording session

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::resource::{Page, Resource};

/// Recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not recording
    #[default]
    Idle,
    /// Mirroring live captures into the recorded buffers
    Recording,
}

/// Recorded subset of captured activity
///
/// The buffers are unbounded and never evicted. They are only emptied by
/// [`RecordingSession::clear`] or [`RecordingSession::start_new`]; toggling
/// with start/stop keeps what was accumulated.
#[derive(Debug, Default)]
pub struct RecordingSession {
    state: SessionState,
    resources: Vec<Resource>,
    pages: Vec<Page>,
    record_date: Option<DateTime<Utc>>,
}

impl RecordingSession {
    /// Create an idle session with empty buffers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin or continue recording
    pub fn start(&mut self) {
        if self.state == SessionState::Idle {
            info!(
                "Recording started ({} resources already recorded)",
                self.resources.len()
            );
        }
        self.state = SessionState::Recording;
    }

    /// Pause recording
    pub fn stop(&mut self) {
        if self.state == SessionState::Recording {
            info!("Recording stopped ({} resources recorded)", self.resources.len());
        }
        self.state = SessionState::Idle;
    }

    /// Empty the recorded buffers without changing state
    pub fn clear(&mut self) {
        self.resources.clear();
        self.pages.clear();
    }

    /// Discard previous recording and start a fresh one dated `now`
    pub fn start_new(&mut self, now: DateTime<Utc>) {
        self.clear();
        self.record_date = Some(now);
        info!("New recording at {}", now.to_rfc3339_opts(SecondsFormat::Millis, true));
        self.start();
    }

    /// Mirror a resource if recording
    pub fn record_resource(&mut self, resource: &Resource) {
        if self.is_recording() {
            self.resources.push(resource.clone());
        }
    }

    /// Mirror a page if recording
    pub fn record_page(&mut self, page: &Page) {
        if self.is_recording() {
            self.pages.push(page.clone());
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while recording
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// Recorded resources, in capture order
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Recorded pages, in navigation order
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// When the current recording was started with [`RecordingSession::start_new`]
    #[must_use]
    pub fn record_date(&self) -> Option<DateTime<Utc>> {
        self.record_date
    }

    /// ISO-8601 rendering of the record date
    #[must_use]
    pub fn record_date_iso(&self) -> Option<String> {
        self.record_date
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}
