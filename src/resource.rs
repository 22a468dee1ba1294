//! Captured resource and page records

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header map; names as delivered by the observer
pub type Headers = BTreeMap<String, String>;

/// Unique identifier attributing resources to a page
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageRef(String);

impl PageRef {
    /// Wrap an identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outgoing request as seen by the observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    /// HTTP method
    pub method: String,
    /// Request URL, also the correlation key
    pub url: String,
    /// Request headers
    #[serde(default)]
    pub headers: Headers,
    /// Request body, if one was sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Completed response as seen by the observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseInfo {
    /// HTTP status code
    pub status: u16,
    /// HTTP status text
    #[serde(default)]
    pub status_text: String,
    /// Response headers
    #[serde(default)]
    pub headers: Headers,
    /// Response body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Final URL after redirects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Resource timing signal, milliseconds relative to the page time origin
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceTiming {
    /// URL of the timed call (the entry's `name`)
    pub url: String,
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
    /// TLS handshake start, 0 when no TLS
    pub secure_connection_start: f64,
}

/// One network call, fully or partially correlated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Request half
    pub request: Option<RequestInfo>,
    /// Response half
    pub response: Option<ResponseInfo>,
    /// Timing half
    pub performance: Option<PerformanceTiming>,
    /// Page active when the call was sent
    pub page_ref: Option<PageRef>,
    /// When correlation completed
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// A resource carrying nothing but its creation time
    #[must_use]
    pub fn empty(created_at: DateTime<Utc>) -> Self {
        Self {
            request: None,
            response: None,
            performance: None,
            page_ref: None,
            created_at,
        }
    }

    /// Attribute the resource to a page
    #[must_use]
    pub fn with_page_ref(mut self, page_ref: PageRef) -> Self {
        self.page_ref = Some(page_ref);
        self
    }

    /// True when request, response, timing and page are all present
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.request.is_some()
            && self.response.is_some()
            && self.performance.is_some()
            && self.page_ref.is_some()
    }
}

/// A navigation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Location at navigation time
    pub url: String,
    /// Document title at navigation time
    pub title: String,
    /// Unique reference
    pub page_ref: PageRef,
    /// Navigation time
    pub start_time: DateTime<Utc>,
}
