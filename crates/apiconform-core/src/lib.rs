//! apiconform-core: Core types for OpenAPI conformance assertions
//!
//! This crate provides the fundamental types shared by the adapter:
//! structural violation reports, adapter configuration, and the media-type
//! and path normalization helpers every validation call relies on.

pub mod config;
pub mod media;
pub mod violation;

pub use config::{Config, ConfigError, TransportKind};
pub use media::{normalize_path, strip_media_type_params};
pub use violation::{Violation, ViolationSet};
