//! har-recorder - bounded in-page network capture with HAR export
//!
//! Correlates request and timing signals into resources, keeps a rolling
//! window of recent activity attributed to pages, and records user-selected
//! spans of activity for export.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod har;
pub mod pages;
pub mod recording;
pub mod resource;
pub mod retention;

pub use capture::{CaptureEvent, RecorderHandle, RecorderService};
pub use config::Config;
pub use error::{HarError, Result};
pub use har::Har;
pub use recording::HarRecorder;
