//! In-memory query cache with single-flight loading and paginated sequences.

use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Notify, OnceCell};
use tracing::{debug, warn};

use super::storage::{CacheStorage, NoopStorage};
use super::traits::{CacheSource, EntryStatus, PageFetch};
use crate::error::FetchError;

/// Result of loading one cache key. Errors are cached like payloads.
pub type Loaded = Result<Arc<Value>, FetchError>;

struct Entry {
  cell: OnceCell<Loaded>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
  Next(String),
  Exhausted,
}

struct PageSequence {
  pages: Vec<Arc<Value>>,
  /// URL each page was loaded from, which is also its storage key
  page_urls: Vec<String>,
  cursor: Cursor,
  in_flight: bool,
  /// Woken whenever `in_flight` goes back to false
  settled: Arc<Notify>,
  error: Option<FetchError>,
}

impl PageSequence {
  fn finish_request(&mut self) {
    self.in_flight = false;
    self.settled.notify_waiters();
  }
}

/// Point-in-time view of a paginated listing.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
  pub pages: Vec<Arc<Value>>,
  pub has_next_page: bool,
  pub in_flight: bool,
  pub error: Option<FetchError>,
}

/// Process-wide query cache.
///
/// Entries are keyed by resolved path (single resources) or by endpoint
/// template (paginated listings). Each key has at most one load in flight;
/// concurrent callers await the same result. Entries live until
/// [`QueryCache::invalidate`] or [`QueryCache::clear`].
pub struct QueryCache<S: CacheStorage = NoopStorage> {
  entries: Mutex<HashMap<String, Arc<Entry>>>,
  sequences: Mutex<HashMap<String, Arc<Mutex<PageSequence>>>>,
  storage: Arc<S>,
  /// How long persisted payloads stay usable; `None` keeps them forever
  max_age: Option<Duration>,
}

impl<S: CacheStorage> QueryCache<S> {
  /// Create a new cache with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      sequences: Mutex::new(HashMap::new()),
      storage: Arc::new(storage),
      max_age: None,
    }
  }

  /// Ignore persisted payloads older than `max_age`.
  pub fn with_max_age(mut self, max_age: Duration) -> Self {
    self.max_age = Some(max_age);
    self
  }

  /// Return the cached result for `key`, loading it with `fetcher` on a miss.
  ///
  /// Only one `fetcher` runs per key. If the caller driving the load is
  /// dropped before it finishes, nothing is committed and the next waiter
  /// takes over.
  pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetcher: F) -> Loaded
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, FetchError>>,
  {
    let entry = self.entry(key);
    if let Some(loaded) = entry.cell.get() {
      debug!(key, "cache hit");
      return loaded.clone();
    }

    entry
      .cell
      .get_or_init(|| async {
        let (loaded, source) = self.load(key, fetcher).await;
        debug!(key, ?source, ok = loaded.is_ok(), "cache entry settled");
        loaded
      })
      .await
      .clone()
  }

  /// The cached result for `key`, if it has settled.
  pub fn peek(&self, key: &str) -> Option<Loaded> {
    lock(&self.entries)
      .get(key)
      .and_then(|entry| entry.cell.get().cloned())
  }

  /// Status of the entry for `key`, or `None` if it was never requested.
  pub fn status(&self, key: &str) -> Option<EntryStatus> {
    lock(&self.entries)
      .get(key)
      .map(|entry| match entry.cell.get() {
        None => EntryStatus::Pending,
        Some(Ok(_)) => EntryStatus::Success,
        Some(Err(_)) => EntryStatus::Error,
      })
  }

  /// Drop the entry (and any paginated listing) stored under `key`.
  ///
  /// Persisted pages of the listing go too, so the next page request hits
  /// the network. A load already in flight completes into the detached
  /// entry; the next request for `key` starts a fresh one.
  pub fn invalidate(&self, key: &str) {
    lock(&self.entries).remove(key);
    let page_urls = lock(&self.sequences)
      .remove(key)
      .map(|sequence| lock(&sequence).page_urls.clone())
      .unwrap_or_default();

    for stored_key in std::iter::once(key).chain(page_urls.iter().map(String::as_str)) {
      if let Err(e) = self.storage.remove(stored_key) {
        warn!(key = stored_key, error = %e, "failed to remove persisted payload");
      }
    }
  }

  /// Drop every entry, in memory and in storage.
  pub fn clear(&self) -> Result<(), FetchError> {
    lock(&self.entries).clear();
    lock(&self.sequences).clear();
    self
      .storage
      .clear()
      .map_err(|e| FetchError::Storage(e.to_string()))
  }

  /// Fetch the next page of the listing stored under `key`.
  ///
  /// The first page is requested from `initial_url`; every later page from
  /// the `next` field of the previous one. A failed request keeps the pages
  /// fetched so far and leaves the cursor in place, so calling again retries
  /// the same URL.
  ///
  /// If another caller's page request is running, this one issues nothing,
  /// waits for that request to settle and returns [`PageFetch::InFlight`].
  pub async fn fetch_next_page<F, Fut>(
    &self,
    key: &str,
    initial_url: &str,
    fetcher: F,
  ) -> Result<PageFetch, FetchError>
  where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<Value, FetchError>>,
  {
    let sequence = self.sequence(key, initial_url);

    let url = {
      let mut seq = lock(&sequence);
      if seq.in_flight {
        None
      } else {
        let url = match &seq.cursor {
          Cursor::Next(url) => url.clone(),
          Cursor::Exhausted => return Ok(PageFetch::Exhausted),
        };
        seq.in_flight = true;
        Some(url)
      }
    };
    let Some(url) = url else {
      debug!(key, "page request already in flight");
      wait_for_page(&sequence).await;
      return Ok(PageFetch::InFlight);
    };

    let guard = InFlightGuard(Some(Arc::clone(&sequence)));
    let fetch_url = url.clone();
    let (loaded, source) = self.load(&url, move || fetcher(fetch_url)).await;
    guard.disarm();

    let mut seq = lock(&sequence);
    seq.finish_request();
    match loaded {
      Ok(page) => {
        seq.cursor = next_cursor(&page);
        seq.pages.push(page);
        seq.page_urls.push(url);
        seq.error = None;
        let index = seq.pages.len() - 1;
        debug!(key, index, ?source, "page appended");
        Ok(PageFetch::Fetched(index))
      }
      Err(e) => {
        seq.error = Some(e.clone());
        Err(e)
      }
    }
  }

  /// Snapshot of the listing stored under `key`, if it was ever requested.
  pub fn page_snapshot(&self, key: &str) -> Option<PageSnapshot> {
    let sequence = lock(&self.sequences).get(key).cloned()?;
    let seq = lock(&sequence);
    Some(PageSnapshot {
      pages: seq.pages.clone(),
      has_next_page: seq.cursor != Cursor::Exhausted,
      in_flight: seq.in_flight,
      error: seq.error.clone(),
    })
  }

  fn entry(&self, key: &str) -> Arc<Entry> {
    let mut entries = lock(&self.entries);
    Arc::clone(entries.entry(key.to_string()).or_insert_with(|| {
      Arc::new(Entry {
        cell: OnceCell::new(),
      })
    }))
  }

  fn sequence(&self, key: &str, initial_url: &str) -> Arc<Mutex<PageSequence>> {
    let mut sequences = lock(&self.sequences);
    Arc::clone(sequences.entry(key.to_string()).or_insert_with(|| {
      Arc::new(Mutex::new(PageSequence {
        pages: Vec::new(),
        page_urls: Vec::new(),
        cursor: Cursor::Next(initial_url.to_string()),
        in_flight: false,
        settled: Arc::new(Notify::new()),
        error: None,
      }))
    }))
  }

  /// Storage first, then network. Successful network payloads are persisted.
  async fn load<F, Fut>(&self, key: &str, fetcher: F) -> (Loaded, CacheSource)
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, FetchError>>,
  {
    match self.storage.get_payload(key) {
      Ok(Some(stored)) if !self.is_expired(stored.cached_at) => {
        return (Ok(Arc::new(stored.payload)), CacheSource::Storage);
      }
      Ok(_) => {}
      Err(e) => warn!(key, error = %e, "failed to read persisted payload"),
    }

    let loaded = fetcher().await.map(|payload| {
      if let Err(e) = self.storage.store_payload(key, &payload) {
        warn!(key, error = %e, "failed to persist payload");
      }
      Arc::new(payload)
    });
    (loaded, CacheSource::Network)
  }

  fn is_expired(&self, cached_at: chrono::DateTime<Utc>) -> bool {
    self
      .max_age
      .is_some_and(|max_age| Utc::now() - cached_at > max_age)
  }
}

impl Default for QueryCache<NoopStorage> {
  fn default() -> Self {
    Self::new(NoopStorage)
  }
}

/// Clears the in-flight flag if a page request is dropped before finishing.
struct InFlightGuard(Option<Arc<Mutex<PageSequence>>>);

impl InFlightGuard {
  fn disarm(mut self) {
    self.0 = None;
  }
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    if let Some(sequence) = self.0.take() {
      lock(&sequence).finish_request();
    }
  }
}

/// Wait until the page request currently running on `sequence` settles.
async fn wait_for_page(sequence: &Mutex<PageSequence>) {
  loop {
    let settled = Arc::clone(&lock(sequence).settled);
    let notified = settled.notified();
    tokio::pin!(notified);
    // Register before checking the flag so a wakeup in between isn't lost
    notified.as_mut().enable();

    let busy = lock(sequence).in_flight;
    if !busy {
      return;
    }
    notified.await;
  }
}

fn next_cursor(page: &Value) -> Cursor {
  match page.get("next").and_then(Value::as_str) {
    Some(url) => Cursor::Next(url.to_string()),
    None => Cursor::Exhausted,
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
