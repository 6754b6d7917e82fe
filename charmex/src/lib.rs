//! Charm catalog extraction from charm box screen captures.
//!
//! Captured stills are reduced to unique frames, read into charm records,
//! repaired, deduplicated, saved as JSON and encoded for export.

pub mod assets;
pub mod config;
pub mod extract;
pub mod frames;
pub mod pipeline;
pub mod repair;

pub use config::Config;
pub use pipeline::{Summary, run};
