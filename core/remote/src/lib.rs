//! Remote API transport for listsync.
//!
//! This module provides the trait-based interface to the externally owned
//! list store and its implementations:
//! - [`HttpRemoteClient`]: REST/JSON client over HTTP
//! - [`MemoryRemote`]: in-process remote with the same semantics, for tests
//!
//! # Design Principles
//! - Unified error semantics: non-2xx answers surface as `Error::Remote` with status and body
//! - Transient failures (timeouts, refused connections) are retried with backoff here,
//!   never by callers

pub mod api;
pub mod http;
pub mod memory;
pub mod model;
pub mod retry;

pub use api::RemoteApi;
pub use http::HttpRemoteClient;
pub use memory::{MemoryRemote, RemoteCall, RemoteOp};
pub use model::{CreateListRequest, NewRemoteItem, RemoteItem, RemoteList};
pub use retry::{RetryConfig, RetryExecutor};
