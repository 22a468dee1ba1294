//! Pairing of request/response halves with timing halves

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::resource::{PageRef, PerformanceTiming, RequestInfo, Resource, ResponseInfo};

/// Request/response half of a call, stamped with the page active at send time
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHalf {
    /// Outgoing request
    pub request: RequestInfo,
    /// Completed response
    pub response: Option<ResponseInfo>,
    /// Page active when the request was sent
    pub page_ref: Option<PageRef>,
}

/// A half waiting for its counterpart
#[derive(Debug, Clone, PartialEq)]
pub enum PendingHalf {
    /// Request/response seen, timing outstanding
    RequestOnly(RequestHalf),
    /// Timing seen, request/response outstanding
    TimingOnly(PerformanceTiming),
}

impl PendingHalf {
    fn is_request(&self) -> bool {
        matches!(self, Self::RequestOnly(_))
    }
}

#[derive(Debug)]
struct Pending {
    half: PendingHalf,
    received_at: DateTime<Utc>,
}

/// Merges the two asynchronous halves of each call into a [`Resource`]
///
/// Halves are keyed by exact URL. Calls to the same URL pair strictly in
/// arrival order: the earliest unmatched half of the opposite kind wins. Two
/// overlapping calls to one URL can therefore be cross-paired.
///
/// Every queue holds halves of a single kind; a half of the other kind would
/// have consumed the front entry on arrival.
pub struct ResourceCorrelator {
    pending: HashMap<String, VecDeque<Pending>>,
    clock: Arc<dyn Clock>,
}

impl ResourceCorrelator {
    /// Create an empty correlator
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            pending: HashMap::new(),
            clock,
        }
    }

    /// Submit the request/response half of a call
    ///
    /// Returns the completed resource when a timing half was waiting.
    pub fn submit_request(&mut self, half: RequestHalf) -> Option<Resource> {
        let key = half.request.url.clone();
        self.submit(key, PendingHalf::RequestOnly(half))
    }

    /// Submit the timing half of a call
    ///
    /// Returns the completed resource when a request half was waiting.
    pub fn submit_timing(&mut self, timing: PerformanceTiming) -> Option<Resource> {
        let key = timing.url.clone();
        self.submit(key, PendingHalf::TimingOnly(timing))
    }

    fn submit(&mut self, key: String, half: PendingHalf) -> Option<Resource> {
        let now = self.clock.now();
        let incoming_is_request = half.is_request();

        if let Some(queue) = self.pending.get_mut(&key) {
            let counterpart_waiting = queue
                .front()
                .is_some_and(|front| front.half.is_request() != incoming_is_request);

            if counterpart_waiting {
                let waiting = queue.pop_front().map(|p| p.half);
                if queue.is_empty() {
                    self.pending.remove(&key);
                }

                let resource = match (waiting, half) {
                    (Some(PendingHalf::RequestOnly(req)), PendingHalf::TimingOnly(timing))
                    | (Some(PendingHalf::TimingOnly(timing)), PendingHalf::RequestOnly(req)) => {
                        merge(req, timing, now)
                    }
                    _ => return None,
                };

                debug!("Correlated resource: {}", key);
                return Some(resource);
            }
        }

        debug!(
            "Pending {} half: {}",
            if incoming_is_request { "request" } else { "timing" },
            key
        );
        self.pending.entry(key).or_default().push_back(Pending {
            half,
            received_at: now,
        });
        None
    }

    /// Drop halves received before `cutoff`; returns how many were dropped
    pub fn expire_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut dropped = 0;
        self.pending.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|p| p.received_at >= cutoff);
            dropped += before - queue.len();
            !queue.is_empty()
        });
        dropped
    }

    /// Number of halves awaiting a counterpart
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }

    /// Halves waiting under `url`, oldest first
    pub fn pending_for(&self, url: &str) -> impl Iterator<Item = &PendingHalf> {
        self.pending
            .get(url)
            .into_iter()
            .flat_map(|queue| queue.iter().map(|p| &p.half))
    }
}

fn merge(half: RequestHalf, timing: PerformanceTiming, created_at: DateTime<Utc>) -> Resource {
    Resource {
        request: Some(half.request),
        response: half.response,
        performance: Some(timing),
        page_ref: half.page_ref,
        created_at,
    }
}
