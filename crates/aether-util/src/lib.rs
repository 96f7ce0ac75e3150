//! Shared utilities for the aether resolution engine.
//!
//! This crate provides the cross-cutting concerns used by the other aether
//! crates: the unified error type, checksum file parsing and hex digests,
//! cooperative cancellation, and a bounded worker pool for background
//! descriptor fetches.

pub mod cancel;
pub mod checksum;
pub mod errors;
pub mod workers;
