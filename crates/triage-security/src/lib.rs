//! PII redaction for ticket payloads
//!
//! Redaction is pattern based and irreversible: matches are replaced with a
//! fixed placeholder per category and nothing about the original text is
//! kept.

pub mod scrubber;

pub use scrubber::{Scrubber, scrub};
