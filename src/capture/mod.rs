//! Capture layer: observer adapters, signal correlation, async service
//!
//! Observers translate host networking hooks into request and timing halves,
//! the correlator pairs them into resources, and the service lets async
//! hosts feed a single recorder without locking.

mod adapter;
mod correlator;
mod service;

use serde::{Deserialize, Serialize};

use crate::{HarError, Result};

pub use adapter::{
    parse_header_block, CallId, CaptureSink, HookEvent, NetworkObserver, ObserverKind,
    RawResponse, TimingEntry, XhrObserver, XHR_INITIATOR,
};
pub use correlator::{PendingHalf, RequestHalf, ResourceCorrelator};
pub use service::{RecorderHandle, RecorderService};

/// Anything that can happen to a recorder, in a loggable form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureEvent {
    /// Networking hook
    Network(HookEvent),
    /// Navigation already known to be a page change
    Navigate {
        /// New location
        url: String,
        /// Document title
        title: String,
    },
    /// Location report; creates a page only if the location changed
    Location {
        /// Current location
        url: String,
        /// Document title
        title: String,
    },
    /// Start or resume recording
    StartRecording,
    /// Pause recording
    StopRecording,
    /// Clear the recorded buffer and start recording
    StartNewRecording,
    /// Clear the recorded buffer
    ClearRecording,
}

impl CaptureEvent {
    /// Parse one line of a JSON-lines capture log
    ///
    /// Blank lines yield `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the line is not a valid event
    pub fn from_line(line: &str, line_number: usize) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        serde_json::from_str(line)
            .map(Some)
            .map_err(|e| HarError::InvalidEvent {
                line: line_number,
                reason: e.to_string(),
            })
    }
}

/// Parse a whole JSON-lines capture log
///
/// # Errors
///
/// Returns error at the first malformed line
pub fn parse_capture_log(text: &str) -> Result<Vec<CaptureEvent>> {
    let mut events = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if let Some(event) = CaptureEvent::from_line(line, i + 1)? {
            events.push(event);
        }
    }
    Ok(events)
}
