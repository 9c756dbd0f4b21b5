//! Packaging dimension resolution.
//!
//! Carton dimensions arrive from three places with different reliability:
//! explicit per-line overrides, batch defaults, and SKU defaults. Each level
//! may also carry only a legacy combined string ("LxWxH", centimeters) from
//! the system that predates structured dimensions. This crate merges them
//! into one canonical triplet, or reports "dims not set", which is a valid
//! user-visible state rather than an error.

pub mod dims;

pub use dims::{CartonSpec, PackagingSnapshot, parse_legacy_dims, resolve, resolve_chain};
