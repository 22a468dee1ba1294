//! Page boundary tracking

use std::sync::Arc;

use tracing::debug;

use crate::clock::{Clock, IdGenerator};
use crate::resource::Page;

/// Creates a [`Page`] for every navigation
///
/// The tracker never reads ambient location state; the host reports
/// locations through [`PageTracker::observe_location`] or calls
/// [`PageTracker::on_navigation_changed`] once it has decided a navigation
/// happened.
pub struct PageTracker {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    last_location: Option<String>,
}

impl PageTracker {
    /// Create a tracker that has seen no location yet
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            clock,
            ids,
            last_location: None,
        }
    }

    /// Build a page for a navigation to `url`
    pub fn on_navigation_changed(&mut self, url: &str, title: &str) -> Page {
        let now = self.clock.now();
        let page = Page {
            url: url.to_string(),
            title: title.to_string(),
            page_ref: self.ids.next_page_ref(now),
            start_time: now,
        };
        self.last_location = Some(page.url.clone());

        debug!("Navigation to {} ({})", page.url, page.page_ref);
        page
    }

    /// Report the current location; yields a page only if it changed
    pub fn observe_location(&mut self, url: &str, title: &str) -> Option<Page> {
        if self.last_location.as_deref() == Some(url) {
            return None;
        }
        Some(self.on_navigation_changed(url, title))
    }

    /// Last location a page was created for
    #[must_use]
    pub fn last_location(&self) -> Option<&str> {
        self.last_location.as_deref()
    }
}
