//! HAR export

mod builder;
mod document;

pub use builder::{parse_query_string, ArchiveSerializer, HarBuilder};
pub use document::{
    Content, Creator, Har, HarCache, HarEntry, HarLog, HarPage, HarRequest, HarResponse,
    HarTimings, NameValue, PostData, HAR_VERSION, HTTP_VERSION,
};
