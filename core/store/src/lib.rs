//! Local store abstraction for listsync.
//!
//! The local side of a reconciliation: lists and their items, each carrying a
//! mutation timestamp and a last-synced watermark. Two backends implement the
//! same contract:
//! - [`SqliteStore`]: the persistent backend
//! - [`MemoryStore`]: an in-memory backend for tests and development
//!
//! # Timestamp rules
//! - Mutations take the instant they happen at and set `updated_at` to it
//! - Linking and stamping write `external_id`/`synced_at` only and never move `updated_at`

pub mod memory;
pub mod model;
pub mod sqlite;
pub mod store;

pub use memory::MemoryStore;
pub use model::{NewItem, StampScope, TodoItem, TodoList};
pub use sqlite::SqliteStore;
pub use store::{LocalStore, LocalStoreExt, StoreTx};
