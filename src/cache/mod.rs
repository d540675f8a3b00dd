//! Query cache for PokeAPI payloads.
//!
//! This module provides an endpoint-agnostic caching mechanism that:
//! - Keeps one entry per cache key for the life of the process
//! - Allows at most one load in flight per key, shared by all callers
//! - Accumulates paginated listings page by page, following a `next` cursor
//! - Optionally persists payloads to SQLite so they survive restarts

mod layer;
mod storage;
mod traits;

pub use layer::{Loaded, PageSnapshot, QueryCache};
pub use storage::{CacheStorage, NoopStorage, SqliteStorage, StoredPayload};
pub use traits::{storage_hash, CacheSource, EntryStatus, PageFetch};
