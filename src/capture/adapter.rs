//! Observer adapters turning networking hooks into correlation signals

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::resource::{Headers, PageRef, PerformanceTiming, RequestInfo, ResponseInfo};
use crate::Result;

use super::correlator::RequestHalf;

/// Identifies one in-flight call within an observer
pub type CallId = u64;

/// Initiator type of resource timing entries produced by XHR
pub const XHR_INITIATOR: &str = "xmlhttprequest";

/// Callbacks an observer uses to reach the recorder
pub trait CaptureSink {
    /// Current time, used to age in-flight calls
    fn now(&self) -> DateTime<Utc>;

    /// Page reference of the newest live page
    ///
    /// # Errors
    ///
    /// Returns error if no page is in the live window
    fn current_page_ref(&self) -> Result<PageRef>;

    /// Deliver a request/response half
    fn submit_request(&mut self, half: RequestHalf);

    /// Deliver a timing half
    fn submit_timing(&mut self, timing: PerformanceTiming);
}

/// Response state at completion, as exposed by the host networking object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// HTTP status text
    #[serde(default)]
    pub status_text: String,
    /// Final URL after redirects
    #[serde(default)]
    pub response_url: Option<String>,
    /// Body text
    #[serde(default)]
    pub response_text: Option<String>,
    /// `name: value` lines separated by CRLF
    #[serde(default)]
    pub all_response_headers: String,
}

/// Resource timing entry as emitted by the host's performance timeline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingEntry {
    /// URL of the timed resource
    pub name: String,
    /// What started the fetch (`xmlhttprequest`, `fetch`, `img`, ...)
    pub initiator_type: String,
    /// Fetch start
    pub start_time: f64,
    /// Total duration
    pub duration: f64,
    /// DNS lookup start
    pub domain_lookup_start: f64,
    /// DNS lookup end
    pub domain_lookup_end: f64,
    /// Connection start
    pub connect_start: f64,
    /// Connection end
    pub connect_end: f64,
    /// TLS handshake start
    pub secure_connection_start: f64,
}

impl From<TimingEntry> for PerformanceTiming {
    fn from(entry: TimingEntry) -> Self {
        Self {
            url: entry.name,
            start_time: entry.start_time,
            duration: entry.duration,
            domain_lookup_start: entry.domain_lookup_start,
            domain_lookup_end: entry.domain_lookup_end,
            connect_start: entry.connect_start,
            connect_end: entry.connect_end,
            secure_connection_start: entry.secure_connection_start,
        }
    }
}

/// Hook points any networking layer can drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "hook", rename_all = "snake_case")]
pub enum HookEvent {
    /// Call opened
    RequestStart {
        /// Call identifier
        call_id: CallId,
        /// HTTP method
        method: String,
        /// Request URL
        url: String,
    },
    /// Request header set
    HeaderSet {
        /// Call identifier
        call_id: CallId,
        /// Header name
        name: String,
        /// Header value
        value: String,
    },
    /// Request sent
    Send {
        /// Call identifier
        call_id: CallId,
        /// Request body
        #[serde(default)]
        body: Option<String>,
    },
    /// Response fully received
    Complete {
        /// Call identifier
        call_id: CallId,
        /// Response state
        response: RawResponse,
    },
    /// Resource timing entry observed
    Timing(TimingEntry),
}

/// Available observer implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObserverKind {
    /// XMLHttpRequest observer
    Xhr,
}

impl ObserverKind {
    /// Instantiate the observer
    #[must_use]
    pub fn build(self) -> Box<dyn NetworkObserver> {
        match self {
            Self::Xhr => Box::new(XhrObserver::new()),
        }
    }
}

/// Adapter between a networking layer and the recorder
pub trait NetworkObserver: Send {
    /// Which implementation this is
    fn kind(&self) -> ObserverKind;

    /// A call was opened
    fn on_request_start(
        &mut self,
        call_id: CallId,
        method: &str,
        url: &str,
        sink: &mut dyn CaptureSink,
    );

    /// A request header was set on an open call
    fn on_header_set(&mut self, call_id: CallId, name: &str, value: &str);

    /// A call was sent
    fn on_send(&mut self, call_id: CallId, body: Option<String>, sink: &mut dyn CaptureSink);

    /// A call completed
    fn on_complete(&mut self, call_id: CallId, response: RawResponse, sink: &mut dyn CaptureSink);

    /// A resource timing entry was observed
    fn on_timing(&mut self, entry: TimingEntry, sink: &mut dyn CaptureSink);

    /// Forget calls opened before `cutoff` that never completed; returns how
    /// many were dropped
    fn expire_older_than(&mut self, _cutoff: DateTime<Utc>) -> usize {
        0
    }

    /// Route a hook event to the matching callback
    fn handle(&mut self, event: HookEvent, sink: &mut dyn CaptureSink) {
        match event {
            HookEvent::RequestStart {
                call_id,
                method,
                url,
            } => self.on_request_start(call_id, &method, &url, sink),
            HookEvent::HeaderSet {
                call_id,
                name,
                value,
            } => self.on_header_set(call_id, &name, &value),
            HookEvent::Send { call_id, body } => self.on_send(call_id, body, sink),
            HookEvent::Complete { call_id, response } => self.on_complete(call_id, response, sink),
            HookEvent::Timing(entry) => self.on_timing(entry, sink),
        }
    }
}

#[derive(Debug)]
struct InFlight {
    method: String,
    url: String,
    headers: Headers,
    body: Option<String>,
    page_ref: Option<PageRef>,
    opened_at: DateTime<Utc>,
}

/// Observer for XMLHttpRequest-style calls
///
/// Tracks each call from open to completion, attributes it to the page that
/// was current at send time, and forwards timing entries initiated by XHR.
#[derive(Debug, Default)]
pub struct XhrObserver {
    in_flight: HashMap<CallId, InFlight>,
}

impl XhrObserver {
    /// Create an observer with no calls in flight
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of opened calls not yet completed
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

impl NetworkObserver for XhrObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Xhr
    }

    fn on_request_start(
        &mut self,
        call_id: CallId,
        method: &str,
        url: &str,
        sink: &mut dyn CaptureSink,
    ) {
        // Re-opening a call discards whatever was set before
        self.in_flight.insert(
            call_id,
            InFlight {
                method: method.to_string(),
                url: url.to_string(),
                headers: Headers::new(),
                body: None,
                page_ref: None,
                opened_at: sink.now(),
            },
        );
    }

    fn on_header_set(&mut self, call_id: CallId, name: &str, value: &str) {
        if let Some(call) = self.in_flight.get_mut(&call_id) {
            call.headers.insert(name.to_lowercase(), value.to_string());
        } else {
            debug!("Header set on unknown call {}", call_id);
        }
    }

    fn on_send(&mut self, call_id: CallId, body: Option<String>, sink: &mut dyn CaptureSink) {
        let Some(call) = self.in_flight.get_mut(&call_id) else {
            debug!("Send on unknown call {}", call_id);
            return;
        };

        call.body = body;
        call.page_ref = match sink.current_page_ref() {
            Ok(page_ref) => Some(page_ref),
            Err(e) => {
                warn!("Call {} to {} has no page: {}", call_id, call.url, e);
                None
            }
        };
    }

    fn on_complete(&mut self, call_id: CallId, response: RawResponse, sink: &mut dyn CaptureSink) {
        let Some(call) = self.in_flight.remove(&call_id) else {
            debug!("Completion for unknown call {}", call_id);
            return;
        };

        // Timing entries carry the absolute URL the host resolved, which a
        // relative open() URL would never match
        let url = match response.response_url.as_deref() {
            Some(resolved) if !resolved.is_empty() => resolved.to_string(),
            _ => call.url,
        };

        let half = RequestHalf {
            request: RequestInfo {
                method: call.method,
                url,
                headers: call.headers,
                body: call.body,
            },
            response: Some(ResponseInfo {
                status: response.status,
                status_text: response.status_text,
                headers: parse_header_block(&response.all_response_headers),
                body: response.response_text,
                url: response.response_url,
            }),
            page_ref: call.page_ref,
        };

        sink.submit_request(half);
    }

    fn on_timing(&mut self, entry: TimingEntry, sink: &mut dyn CaptureSink) {
        if entry.initiator_type == XHR_INITIATOR {
            sink.submit_timing(entry.into());
        }
    }

    fn expire_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.in_flight.len();
        self.in_flight.retain(|_, call| call.opened_at >= cutoff);
        before - self.in_flight.len()
    }
}

/// Parse a raw response header block into a map
///
/// Blank lines and lines without a colon are skipped.
#[must_use]
pub fn parse_header_block(block: &str) -> Headers {
    block
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
