//! Bounded live window of resources and pages

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tracing::debug;

use crate::clock::Clock;
use crate::resource::{Page, PageRef, Resource};

/// Borrowed view of the live window after reconciliation
#[derive(Debug, Clone, Copy)]
pub struct LiveWindow<'a> {
    /// Surviving resources, oldest first
    pub resources: &'a [Resource],
    /// Pages referenced by a surviving resource, in navigation order
    pub pages: &'a [Page],
}

/// Rolling window bounded by resource age and count
///
/// Bounds are enforced by [`RetentionStore::reconcile`], which runs inline on
/// every insertion and read rather than on a timer. Between calls the window
/// may hold more than the bounds allow.
pub struct RetentionStore {
    resources: Vec<Resource>,
    pages: Vec<Page>,
    life_limit: TimeDelta,
    max_count: usize,
    clock: Arc<dyn Clock>,
}

impl RetentionStore {
    /// Create an empty store
    #[must_use]
    pub fn new(life_limit: Duration, max_count: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            resources: Vec::new(),
            pages: Vec::new(),
            life_limit: TimeDelta::from_std(life_limit).unwrap_or(TimeDelta::MAX),
            max_count,
            clock,
        }
    }

    /// Append a resource and reconcile
    pub fn add_resource(&mut self, resource: Resource) {
        self.resources.push(resource);
        self.reconcile();
    }

    /// Append a page; pages are only pruned on the next reconciliation
    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Reconcile and return the live window
    pub fn snapshot(&mut self) -> LiveWindow<'_> {
        self.reconcile();
        LiveWindow {
            resources: &self.resources,
            pages: &self.pages,
        }
    }

    /// Newest page in the window, without reconciling
    #[must_use]
    pub fn last_page(&self) -> Option<&Page> {
        self.pages.last()
    }

    /// Resource count without reconciling
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Page count without reconciling
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Apply age eviction, count eviction and page pruning, in that order
    pub fn reconcile(&mut self) {
        let now = self.clock.now();
        let before = self.resources.len();

        self.resources
            .retain(|r| now.signed_duration_since(r.created_at) < self.life_limit);
        let expired = before - self.resources.len();

        let overflow = self.resources.len().saturating_sub(self.max_count);
        if overflow > 0 {
            self.resources.drain(..overflow);
        }

        let referenced: HashSet<&PageRef> = self
            .resources
            .iter()
            .filter_map(|r| r.page_ref.as_ref())
            .collect();
        let pages_before = self.pages.len();
        self.pages.retain(|p| referenced.contains(&p.page_ref));
        let pruned = pages_before - self.pages.len();

        if expired > 0 || overflow > 0 || pruned > 0 {
            debug!(
                "Reconciled live window: {} expired, {} over limit, {} pages pruned",
                expired, overflow, pruned
            );
        }
    }
}
