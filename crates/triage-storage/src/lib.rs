//! Storage layer for triage
//!
//! Saved prompts are plain JSON documents in one directory, addressed by
//! filename. Names are sanitised before they touch the filesystem.

pub mod error;
pub mod prompts;

pub use error::{Result, StorageError};
pub use prompts::{PromptDocument, PromptLibrary, sanitize_filename};
