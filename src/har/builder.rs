//! Mapping of captured resources and pages to a HAR document

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use crate::resource::{Headers, Page, Resource};

use super::document::{
    Content, Creator, Har, HarCache, HarEntry, HarLog, HarPage, HarRequest, HarResponse,
    HarTimings, NameValue, PostData, HAR_VERSION, HTTP_VERSION,
};

/// Renders a resource sequence and page sequence into an export document
pub trait ArchiveSerializer {
    /// Produced document type
    type Output;

    /// Render `resources` against `pages`
    fn serialize(&self, resources: &[Resource], pages: &[Page]) -> Self::Output;
}

/// HAR 1.2 serializer
///
/// Resources that are incomplete, point at a page missing from `pages`, or
/// carry a `data:image/` URL are left out without error.
#[derive(Debug, Clone, Default)]
pub struct HarBuilder {
    creator: Creator,
}

impl HarBuilder {
    /// Serializer with an explicit creator
    #[must_use]
    pub fn new(creator: Creator) -> Self {
        Self { creator }
    }

    /// Creator written to the envelope
    #[must_use]
    pub fn creator(&self) -> &Creator {
        &self.creator
    }
}

impl ArchiveSerializer for HarBuilder {
    type Output = Har;

    fn serialize(&self, resources: &[Resource], pages: &[Page]) -> Har {
        let entries = resources
            .iter()
            .filter_map(|resource| build_entry(resource, pages))
            .collect();

        let pages = pages
            .iter()
            .map(|page| HarPage {
                started_date_time: iso(page.start_time),
                id: page.page_ref.to_string(),
                title: format!("{} ({})", page.title, page.url),
            })
            .collect();

        Har {
            log: HarLog {
                version: HAR_VERSION.to_string(),
                creator: self.creator.clone(),
                pages,
                entries,
            },
        }
    }
}

fn build_entry(resource: &Resource, pages: &[Page]) -> Option<HarEntry> {
    let request = resource.request.as_ref()?;
    let response = resource.response.as_ref()?;
    let performance = resource.performance.as_ref()?;
    let page_ref = resource.page_ref.as_ref()?;
    let page = pages.iter().find(|p| &p.page_ref == page_ref)?;

    if is_data_image(&request.url) {
        return None;
    }

    // Out-of-range offsets from the host fall back to the page start
    let started = offset_ms(performance.start_time)
        .and_then(|offset| page.start_time.checked_add_signed(offset))
        .unwrap_or(page.start_time);

    let ssl = if performance.secure_connection_start > 0.0 {
        performance.connect_end - performance.secure_connection_start
    } else {
        0.0
    };

    Some(HarEntry {
        pageref: page_ref.to_string(),
        started_date_time: iso(started),
        time: performance.duration,
        request: HarRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            http_version: HTTP_VERSION.to_string(),
            cookies: Vec::new(),
            headers: name_values(&request.headers),
            query_string: parse_query_string(&request.url)
                .into_iter()
                .map(|(name, value)| NameValue::new(name, value))
                .collect(),
            headers_size: -1,
            body_size: content_length(&request.headers),
            post_data: request.body.as_ref().map(|text| PostData {
                mime_type: content_type(&request.headers),
                text: text.clone(),
            }),
        },
        response: HarResponse {
            status: response.status,
            status_text: response.status_text.clone(),
            http_version: HTTP_VERSION.to_string(),
            cookies: Vec::new(),
            headers: name_values(&response.headers),
            redirect_url: String::new(),
            headers_size: -1,
            body_size: content_length(&response.headers),
            content: Content {
                size: content_length(&response.headers),
                mime_type: content_type(&response.headers),
                text: response.body.clone(),
            },
        },
        cache: HarCache {},
        timings: HarTimings {
            blocked: 0.0,
            dns: performance.domain_lookup_end - performance.domain_lookup_start,
            connect: performance.connect_end - performance.connect_start,
            send: 0.0,
            wait: 0.0,
            receive: 0.0,
            ssl,
        },
    })
}

fn offset_ms(ms: f64) -> Option<TimeDelta> {
    let micros = (ms * 1000.0).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(TimeDelta::microseconds(micros as i64))
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn is_data_image(url: &str) -> bool {
    const PREFIX: &str = "data:image/";
    url.get(..PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(PREFIX))
}

fn name_values(headers: &Headers) -> Vec<NameValue> {
    headers
        .iter()
        .map(|(name, value)| NameValue::new(name.as_str(), value.as_str()))
        .collect()
}

fn header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn content_length(headers: &Headers) -> i64 {
    header(headers, "content-length")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn content_type(headers: &Headers) -> String {
    header(headers, "content-type").unwrap_or_default().to_string()
}

/// Query parameters of `url` as ordered name/value pairs
///
/// A repeated name keeps its first position and takes the last value.
#[must_use]
pub fn parse_query_string(url: &str) -> Vec<(String, String)> {
    let Some((_, rest)) = url.split_once('?') else {
        return Vec::new();
    };
    let query = rest.split('#').next().unwrap_or_default();

    let mut params: Vec<(String, String)> = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = decode_component(name);
        let value = decode_component(value);

        match params.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => params.push((name, value)),
        }
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
