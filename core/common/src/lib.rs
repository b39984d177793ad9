//! Common utilities and types shared across listsync modules.
//!
//! This module provides foundational types that are used throughout the codebase:
//! the workspace-wide error type and the typed identifiers that key local and
//! remote records.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ExternalId, ItemId, ListId};
