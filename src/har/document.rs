//! HAR 1.2 document model

use serde::{Deserialize, Serialize};

use crate::Result;

/// Format version written to `log.version`
pub const HAR_VERSION: &str = "1.2";

/// HTTP version reported for every entry
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Top-level HAR document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Har {
    /// Archive body
    pub log: HarLog,
}

impl Har {
    /// Compact JSON rendering
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON rendering
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Archive body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarLog {
    /// Format version
    pub version: String,
    /// Producing application
    pub creator: Creator,
    /// Pages, in navigation order
    pub pages: Vec<HarPage>,
    /// Entries, in capture order
    pub entries: Vec<HarEntry>,
}

/// Producing application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    /// Application name
    pub name: String,
    /// Application version
    pub version: String,
}

impl Default for Creator {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Page record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPage {
    /// Navigation time, ISO-8601
    pub started_date_time: String,
    /// Page reference
    pub id: String,
    /// `<title> (<url>)`
    pub title: String,
}

/// One request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    /// Owning page
    pub pageref: String,
    /// Request start, ISO-8601
    pub started_date_time: String,
    /// Total time in milliseconds
    pub time: f64,
    /// Request
    pub request: HarRequest,
    /// Response
    pub response: HarResponse,
    /// Cache info, always empty
    pub cache: HarCache,
    /// Phase timings
    pub timings: HarTimings,
}

/// Name/value pair used for headers, cookies and query parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    /// Name
    pub name: String,
    /// Value
    pub value: String,
    /// Comment, always empty
    #[serde(default)]
    pub comment: String,
}

impl NameValue {
    /// Pair with an empty comment
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            comment: String::new(),
        }
    }
}

/// Request record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    /// HTTP method
    pub method: String,
    /// Full URL
    pub url: String,
    /// HTTP version
    pub http_version: String,
    /// Cookies, always empty
    pub cookies: Vec<NameValue>,
    /// Headers
    pub headers: Vec<NameValue>,
    /// Parsed query parameters
    pub query_string: Vec<NameValue>,
    /// Unknown, -1
    pub headers_size: i64,
    /// From `content-length`, 0 if absent
    pub body_size: i64,
    /// Request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
}

/// Posted body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
    /// From `content-type`
    pub mime_type: String,
    /// Body text
    pub text: String,
}

/// Response record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    /// HTTP status code
    pub status: u16,
    /// HTTP status text
    pub status_text: String,
    /// HTTP version
    pub http_version: String,
    /// Cookies, always empty
    pub cookies: Vec<NameValue>,
    /// Headers
    pub headers: Vec<NameValue>,
    /// Redirect target, always empty
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    /// Unknown, -1
    pub headers_size: i64,
    /// From `content-length`, 0 if absent
    pub body_size: i64,
    /// Body
    pub content: Content,
}

/// Response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// From `content-length`, 0 if absent
    pub size: i64,
    /// From `content-type`
    pub mime_type: String,
    /// Body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Cache info; serialized as `{}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarCache {}

/// Phase timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarTimings {
    /// Not measured
    pub blocked: f64,
    /// DNS resolution
    pub dns: f64,
    /// TCP connect
    pub connect: f64,
    /// Not measured
    pub send: f64,
    /// Not measured
    pub wait: f64,
    /// Not measured
    pub receive: f64,
    /// TLS handshake
    pub ssl: f64,
}
