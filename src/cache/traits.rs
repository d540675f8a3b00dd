//! Core types for the caching system.

use sha2::{Digest, Sha256};

/// Lifecycle of a single cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
  /// A load is in flight (or was abandoned before completing)
  Pending,
  /// The last load produced a payload
  Success,
  /// The last load failed; the error is kept until the entry is invalidated
  Error,
}

/// Indicates where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the network
  Network,
  /// Served from persistent storage
  Storage,
}

/// Outcome of a request for the next page of a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFetch {
  /// A page was appended at this index
  Fetched(usize),
  /// Another request for this listing was running; nothing was sent and
  /// the call returned once that request settled
  InFlight,
  /// The last page had no `next` cursor; nothing was sent
  Exhausted,
}

/// Stable, fixed-length storage key for a cache key.
pub fn storage_hash(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hex::encode(hasher.finalize())
}
