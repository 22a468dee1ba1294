//! Recorder wiring capture, retention, pages and the recording session

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::capture::{
    CaptureEvent, CaptureSink, HookEvent, NetworkObserver, RequestHalf, ResourceCorrelator,
};
use crate::clock::{Clock, IdGenerator, SystemClock, TimestampIdGenerator};
use crate::config::Config;
use crate::har::{ArchiveSerializer, Har, HarBuilder};
use crate::pages::PageTracker;
use crate::resource::{Page, PageRef, PerformanceTiming, Resource};
use crate::retention::{LiveWindow, RetentionStore};
use crate::{HarError, Result};

use super::session::RecordingSession;

/// Point-in-time counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecorderStats {
    /// Resources in the live window
    pub live_resources: usize,
    /// Pages in the live window
    pub live_pages: usize,
    /// Halves awaiting a counterpart
    pub pending_halves: usize,
    /// Resources in the recorded buffer
    pub recorded_resources: usize,
    /// Pages in the recorded buffer
    pub recorded_pages: usize,
    /// Whether recording is on
    pub recording: bool,
}

/// Single owner of all capture state
///
/// Every method runs to completion before the next one starts; hosts that
/// receive events concurrently should funnel them through
/// [`crate::capture::RecorderService`].
pub struct HarRecorder {
    correlator: ResourceCorrelator,
    pages: PageTracker,
    store: RetentionStore,
    session: RecordingSession,
    observers: Vec<Box<dyn NetworkObserver>>,
    serializer: HarBuilder,
    clock: Arc<dyn Clock>,
    pending_ttl: Option<TimeDelta>,
}

impl HarRecorder {
    /// Recorder on the wall clock with time-derived page references
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_sources(
            config,
            Arc::new(SystemClock),
            Arc::new(TimestampIdGenerator::new()),
        )
    }

    /// Recorder with injected time and id sources
    #[must_use]
    pub fn with_sources(
        config: &Config,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            correlator: ResourceCorrelator::new(Arc::clone(&clock)),
            pages: PageTracker::new(Arc::clone(&clock), ids),
            store: RetentionStore::new(
                config.resource_life_limit(),
                config.max_resource_count,
                Arc::clone(&clock),
            ),
            session: RecordingSession::new(),
            observers: config.observers.iter().map(|kind| kind.build()).collect(),
            serializer: HarBuilder::new(config.creator.clone()),
            clock,
            pending_ttl: config
                .pending_ttl()
                .and_then(|ttl| TimeDelta::from_std(ttl).ok()),
        }
    }

    /// Record a navigation; the page goes to the live window and, while
    /// recording, to the recorded buffer
    pub fn on_navigation_changed(&mut self, url: &str, title: &str) -> PageRef {
        let page = self.pages.on_navigation_changed(url, title);
        self.push_page(page)
    }

    /// Report the current location; only a changed location creates a page
    pub fn observe_location(&mut self, url: &str, title: &str) -> Option<PageRef> {
        let page = self.pages.observe_location(url, title)?;
        Some(self.push_page(page))
    }

    fn push_page(&mut self, page: Page) -> PageRef {
        let page_ref = page.page_ref.clone();
        self.session.record_page(&page);
        self.store.add_page(page);
        page_ref
    }

    /// Reference of the newest page in the live window
    ///
    /// The live window prunes pages nothing references, so a page that has
    /// not yet received a resource may already be gone here.
    ///
    /// # Errors
    ///
    /// Returns [`HarError::NoCurrentPage`] before any navigation or once every
    /// page has been pruned
    pub fn current_page_ref(&self) -> Result<PageRef> {
        self.store
            .last_page()
            .map(|page| page.page_ref.clone())
            .ok_or(HarError::NoCurrentPage)
    }

    /// Ingest a completed resource
    pub fn add_resource(&mut self, resource: Resource) {
        self.session.record_resource(&resource);
        self.store.add_resource(resource);
    }

    /// Route a hook event to every observer
    pub fn handle_hook(&mut self, event: &HookEvent) {
        let mut observers = std::mem::take(&mut self.observers);
        if let Some(cutoff) = self.pending_cutoff() {
            for observer in &mut observers {
                let dropped = observer.expire_older_than(cutoff);
                if dropped > 0 {
                    warn!("Dropped {} calls that never completed", dropped);
                }
            }
        }
        for observer in &mut observers {
            observer.handle(event.clone(), self);
        }
        self.observers = observers;
    }

    /// Apply one capture event
    pub fn apply(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Network(hook) => self.handle_hook(&hook),
            CaptureEvent::Navigate { url, title } => {
                self.on_navigation_changed(&url, &title);
            }
            CaptureEvent::Location { url, title } => {
                self.observe_location(&url, &title);
            }
            CaptureEvent::StartRecording => self.start_recording(),
            CaptureEvent::StopRecording => self.stop_recording(),
            CaptureEvent::StartNewRecording => self.start_new_recording(),
            CaptureEvent::ClearRecording => self.clear_recording(),
        }
    }

    /// Resume mirroring into the recorded buffer
    pub fn start_recording(&mut self) {
        self.session.start();
    }

    /// Pause mirroring into the recorded buffer
    pub fn stop_recording(&mut self) {
        self.session.stop();
    }

    /// Empty the recorded buffer and start recording
    pub fn start_new_recording(&mut self) {
        self.session.start_new(self.clock.now());
    }

    /// Empty the recorded buffer
    pub fn clear_recording(&mut self) {
        self.session.clear();
    }

    /// Whether recording is on
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    /// Date of the current recording
    #[must_use]
    pub fn record_date(&self) -> Option<DateTime<Utc>> {
        self.session.record_date()
    }

    /// Recording session state
    #[must_use]
    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    /// Reconcile and return the live window
    pub fn snapshot(&mut self) -> LiveWindow<'_> {
        self.store.snapshot()
    }

    /// Export the live window as HAR
    pub fn export_live(&mut self) -> Har {
        let window = self.store.snapshot();
        self.serializer.serialize(window.resources, window.pages)
    }

    /// Export the recorded buffer as HAR
    #[must_use]
    pub fn export_recorded(&self) -> Har {
        self.export_recorded_with(&self.serializer)
    }

    /// Reconcile and render the live window with `serializer`
    pub fn export_live_with<S: ArchiveSerializer>(&mut self, serializer: &S) -> S::Output {
        let window = self.store.snapshot();
        serializer.serialize(window.resources, window.pages)
    }

    /// Render the recorded buffer with `serializer`; no eviction applies
    pub fn export_recorded_with<S: ArchiveSerializer>(&self, serializer: &S) -> S::Output {
        serializer.serialize(self.session.resources(), self.session.pages())
    }

    /// Counters, after reconciling the live window
    pub fn stats(&mut self) -> RecorderStats {
        let window = self.store.snapshot();
        RecorderStats {
            live_resources: window.resources.len(),
            live_pages: window.pages.len(),
            pending_halves: self.correlator.pending_count(),
            recorded_resources: self.session.resources().len(),
            recorded_pages: self.session.pages().len(),
            recording: self.session.is_recording(),
        }
    }

    fn expire_pending(&mut self) {
        let Some(cutoff) = self.pending_cutoff() else {
            return;
        };
        let dropped = self.correlator.expire_older_than(cutoff);
        if dropped > 0 {
            warn!("Dropped {} uncorrelated halves received before {}", dropped, cutoff);
        }
    }

    fn pending_cutoff(&self) -> Option<DateTime<Utc>> {
        let ttl = self.pending_ttl?;
        self.clock.now().checked_sub_signed(ttl)
    }
}

impl CaptureSink for HarRecorder {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn current_page_ref(&self) -> Result<PageRef> {
        HarRecorder::current_page_ref(self)
    }

    fn submit_request(&mut self, half: RequestHalf) {
        self.expire_pending();
        if let Some(resource) = self.correlator.submit_request(half) {
            self.add_resource(resource);
        }
    }

    fn submit_timing(&mut self, timing: PerformanceTiming) {
        self.expire_pending();
        if let Some(resource) = self.correlator.submit_timing(timing) {
            debug!("Timing completed resource");
            self.add_resource(resource);
        }
    }
}
