//! Views over cached PokeAPI requests, for consumers that drive their own
//! event loop.
//!
//! A [`Query`] tracks one request through idle, loading, success or error.
//! An [`InfiniteQuery`] tracks a listing that grows a page at a time. Neither
//! owns the payload: the shared cache does. A view only keeps its decoded copy,
//! and dropping a view cancels whatever request it still has pending.
//!
//! ```ignore
//! let mut pikachu = api.query::<PokemonDetail>(&[("id", "25")]);
//!
//! loop {
//!     if pikachu.poll() {
//!         redraw(pikachu.state());
//!     }
//! }
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::{PageFetch, PageSnapshot};
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub enum QueryState<T> {
  Idle,
  Loading,
  Success(T),
  Error(FetchError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    if let QueryState::Success(data) = self {
      Some(data)
    } else {
      None
    }
  }

  pub fn error(&self) -> Option<&FetchError> {
    if let QueryState::Error(e) = self {
      Some(e)
    } else {
      None
    }
  }

  fn from_outcome(outcome: Result<T, FetchError>) -> Self {
    match outcome {
      Ok(data) => QueryState::Success(data),
      Err(e) => QueryState::Error(e),
    }
  }
}

/// Decode a cached JSON payload into an endpoint's typed shape.
pub fn decode_payload<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, FetchError> {
  T::deserialize(value).map_err(|e| FetchError::Decode {
    key: key.to_string(),
    message: e.to_string(),
  })
}

type Request<T> = BoxFuture<'static, Result<T, FetchError>>;
type FetcherFn<T> = Box<dyn Fn() -> Request<T> + Send + Sync>;

/// A request running on the runtime, seen from the view that started it.
///
/// Dropping it closes the channel, and the spawned task drops the request
/// future at its next await point without sending anything.
struct Pending<T> {
  rx: mpsc::UnboundedReceiver<Result<T, FetchError>>,
}

impl<T: Send + 'static> Pending<T> {
  fn spawn(request: Request<T>) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
      tokio::select! {
        _ = tx.closed() => debug!("view dropped before its request finished"),
        outcome = request => {
          let _ = tx.send(outcome);
        }
      }
    });
    Self { rx }
  }

  /// The outcome, if it has arrived.
  fn try_take(&mut self) -> Option<Result<T, FetchError>> {
    match self.rx.try_recv() {
      Ok(outcome) => Some(outcome),
      Err(mpsc::error::TryRecvError::Empty) => None,
      Err(mpsc::error::TryRecvError::Disconnected) => Some(Err(FetchError::Cancelled)),
    }
  }

  async fn wait(&mut self) -> Result<T, FetchError> {
    self.rx.recv().await.unwrap_or(Err(FetchError::Cancelled))
  }
}

/// A single request and the state of its latest attempt.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  pending: Option<Pending<T>>,
}

impl<T: Send + 'static> Query<T> {
  /// `fetcher` builds a fresh request future on every `fetch`/`refetch`.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || fetcher().boxed()),
      pending: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.state.error()
  }

  /// Start a request unless one is already pending.
  pub fn fetch(&mut self) {
    if self.pending.is_none() {
      self.start();
    }
  }

  /// Drop any pending request and start over.
  pub fn refetch(&mut self) {
    self.pending = None;
    self.start();
  }

  /// Pick up a finished request without blocking.
  ///
  /// Returns `true` when the state changed, which is the caller's cue to
  /// redraw.
  pub fn poll(&mut self) -> bool {
    let Some(outcome) = self.pending.as_mut().and_then(Pending::try_take) else {
      return false;
    };
    self.pending = None;
    self.state = QueryState::from_outcome(outcome);
    true
  }

  /// Wait for the pending request, if any, and return the resulting state.
  pub async fn settled(&mut self) -> &QueryState<T> {
    if let Some(mut pending) = self.pending.take() {
      self.state = QueryState::from_outcome(pending.wait().await);
    }
    &self.state
  }

  fn start(&mut self) {
    self.state = QueryState::Loading;
    self.pending = Some(Pending::spawn((self.fetcher)()));
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("pending", &self.pending.is_some())
      .finish()
  }
}

type NextPageFn = Box<dyn Fn() -> Request<PageFetch> + Send + Sync>;
type SnapshotFn = Box<dyn Fn() -> Option<PageSnapshot> + Send + Sync>;

/// Paginated query: an append-only list of pages plus `fetch_next_page`.
///
/// Pages themselves live in the shared cache; this view decodes them as they
/// arrive. A second view over the same listing starts with every page the
/// first one fetched.
pub struct InfiniteQuery<T> {
  key: String,
  pages: Vec<T>,
  next_page: NextPageFn,
  snapshot: SnapshotFn,
  pending: Option<Pending<PageFetch>>,
  has_next_page: bool,
  error: Option<FetchError>,
}

impl<T: DeserializeOwned + Send + 'static> InfiniteQuery<T> {
  /// Create a paginated view over the listing stored under `key`.
  ///
  /// `next_page` requests one more page; `snapshot` reads the pages fetched
  /// so far.
  pub fn new<F, Fut, G>(key: impl Into<String>, next_page: F, snapshot: G) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PageFetch, FetchError>> + Send + 'static,
    G: Fn() -> Option<PageSnapshot> + Send + Sync + 'static,
  {
    Self {
      key: key.into(),
      pages: Vec::new(),
      next_page: Box::new(move || next_page().boxed()),
      snapshot: Box::new(snapshot),
      pending: None,
      has_next_page: true,
      error: None,
    }
  }

  /// Pick up pages already in the cache, or request the first one.
  pub fn start(&mut self) {
    self.sync();
    if self.pages.is_empty() && self.error.is_none() {
      self.fetch_next_page();
    }
  }

  /// Request the next page.
  ///
  /// No-op while a page request from this view is pending or once the
  /// listing is exhausted. If another view's request for the listing is
  /// already running, this one waits on it and picks up the same page.
  pub fn fetch_next_page(&mut self) {
    if self.pending.is_some() || !self.has_next_page {
      return;
    }
    self.pending = Some(Pending::spawn((self.next_page)()));
  }

  /// Poll for the result of a pending page request.
  ///
  /// Returns `true` if the pages or the error changed.
  pub fn poll(&mut self) -> bool {
    let Some(outcome) = self.pending.as_mut().and_then(Pending::try_take) else {
      return false;
    };
    self.pending = None;
    self.settle(outcome);
    true
  }

  /// Wait for the pending page request to settle.
  pub async fn settled(&mut self) {
    if let Some(mut pending) = self.pending.take() {
      let outcome = pending.wait().await;
      self.settle(outcome);
    }
  }

  /// Pages fetched so far, in fetch order.
  pub fn pages(&self) -> &[T] {
    &self.pages
  }

  /// True until the first page arrives.
  pub fn is_loading(&self) -> bool {
    self.pending.is_some() && self.pages.is_empty()
  }

  pub fn is_fetching_next_page(&self) -> bool {
    self.pending.is_some() && !self.pages.is_empty()
  }

  pub fn has_next_page(&self) -> bool {
    self.has_next_page
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.error.as_ref()
  }

  fn settle(&mut self, outcome: Result<PageFetch, FetchError>) {
    match outcome {
      Ok(fetch) => {
        debug!(key = %self.key, ?fetch, "page request settled");
        self.error = None;
        self.sync();
      }
      Err(e) => {
        self.sync();
        self.error = Some(e);
      }
    }
  }

  /// Decode any pages the cache holds that this view hasn't seen yet.
  fn sync(&mut self) {
    let Some(snapshot) = (self.snapshot)() else {
      return;
    };

    self.has_next_page = snapshot.has_next_page;
    if let Some(e) = snapshot.error {
      self.error = Some(e);
    }

    for value in snapshot.pages.iter().skip(self.pages.len()) {
      match decode_payload(&self.key, value) {
        Ok(page) => self.pages.push(page),
        Err(e) => {
          self.error = Some(e);
          break;
        }
      }
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for InfiniteQuery<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("InfiniteQuery")
      .field("key", &self.key)
      .field("pages", &self.pages.len())
      .field("has_next_page", &self.has_next_page)
      .field("error", &self.error)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::QueryCache;
  use serde::Deserialize;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Mon {
    id: u32,
    name: String,
  }

  /// A view that loads `key` through `cache`, counting network calls.
  fn mon_view(cache: &Arc<QueryCache>, key: &'static str, hits: &Arc<AtomicU32>) -> Query<Mon> {
    let cache = Arc::clone(cache);
    let hits = Arc::clone(hits);
    Query::new(move || {
      let cache = Arc::clone(&cache);
      let hits = Arc::clone(&hits);
      async move {
        let value = cache
          .get_or_fetch(key, || async move {
            hits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(json!({"id": 25, "name": "pikachu"}))
          })
          .await?;
        decode_payload(key, &value)
      }
    })
  }

  #[tokio::test]
  async fn test_poll_reports_each_transition_once() {
    let cache: Arc<QueryCache> = Arc::new(QueryCache::default());
    let hits = Arc::new(AtomicU32::new(0));
    let mut view = mon_view(&cache, "/pokemon/25", &hits);

    assert!(matches!(view.state(), QueryState::Idle));
    assert!(!view.poll());

    view.fetch();
    assert!(view.is_loading());
    assert!(!view.poll());

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(view.poll());
    assert!(!view.poll());
    assert_eq!(view.data().map(|m| m.name.as_str()), Some("pikachu"));
  }

  #[tokio::test]
  async fn test_views_on_one_key_share_a_request() {
    let cache: Arc<QueryCache> = Arc::new(QueryCache::default());
    let hits = Arc::new(AtomicU32::new(0));
    let mut list_row = mon_view(&cache, "/pokemon/25", &hits);
    let mut detail = mon_view(&cache, "/pokemon/25", &hits);

    list_row.fetch();
    detail.fetch();
    // Already pending, so nothing new starts
    detail.fetch();

    assert_eq!(list_row.settled().await.data().map(|m| m.id), Some(25));
    assert!(detail.settled().await.is_success());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_error_state_carries_fetch_error() {
    let mut view: Query<Mon> = Query::new(|| async {
      Err(FetchError::Status {
        url: "https://pokeapi.co/api/v2/pokemon/0".to_string(),
        status: 404,
      })
    });

    view.fetch();
    assert!(view.settled().await.is_error());
    assert!(view.data().is_none());
    assert!(matches!(view.error(), Some(FetchError::Status { status: 404, .. })));
  }

  #[tokio::test]
  async fn test_refetch_drops_the_first_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let finished = Arc::new(AtomicU32::new(0));
    let (a, f) = (Arc::clone(&attempts), Arc::clone(&finished));

    let mut view = Query::new(move || {
      let attempt = a.fetch_add(1, Ordering::SeqCst);
      let finished = Arc::clone(&f);
      async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        finished.fetch_add(1, Ordering::SeqCst);
        Ok(attempt)
      }
    });

    view.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    view.refetch();

    assert!(matches!(view.settled().await, QueryState::Success(1)));
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_dropped_view_leaves_cache_untouched() {
    let cache: Arc<QueryCache> = Arc::new(QueryCache::default());
    let hits = Arc::new(AtomicU32::new(0));
    let mut view = mon_view(&cache, "/pokemon/25", &hits);

    view.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(view);
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(cache.peek("/pokemon/25").is_none());
  }

  #[derive(Debug, Deserialize, PartialEq)]
  struct Page {
    results: Vec<u32>,
  }

  fn paged_view(
    cache: &Arc<QueryCache>,
    calls: &Arc<AtomicU32>,
  ) -> InfiniteQuery<Page> {
    let next_cache = Arc::clone(cache);
    let snapshot_cache = Arc::clone(cache);
    let calls = Arc::clone(calls);

    InfiniteQuery::new(
      "list",
      move || {
        let cache = Arc::clone(&next_cache);
        let calls = Arc::clone(&calls);
        async move {
          cache
            .fetch_next_page("list", "page1", |url| async move {
              calls.fetch_add(1, Ordering::SeqCst);
              tokio::time::sleep(Duration::from_millis(30)).await;
              match url.as_str() {
                "page1" => Ok(json!({"next": "page2", "results": [1, 2]})),
                _ => Ok(json!({"next": null, "results": [3]})),
              }
            })
            .await
        }
      },
      move || snapshot_cache.page_snapshot("list"),
    )
  }

  #[tokio::test]
  async fn test_infinite_query_pages() {
    let cache: Arc<QueryCache> = Arc::new(QueryCache::default());
    let calls = Arc::new(AtomicU32::new(0));
    let mut view = paged_view(&cache, &calls);

    view.start();
    assert!(view.is_loading());
    view.settled().await;

    assert_eq!(view.pages(), &[Page { results: vec![1, 2] }]);
    assert!(view.has_next_page());

    view.fetch_next_page();
    assert!(view.is_fetching_next_page());
    view.settled().await;

    assert_eq!(view.pages().len(), 2);
    assert_eq!(view.pages()[1].results, vec![3]);
    assert!(!view.has_next_page());

    // Exhausted: no further request is made
    view.fetch_next_page();
    assert!(!view.poll());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_second_view_reuses_cached_pages() {
    let cache: Arc<QueryCache> = Arc::new(QueryCache::default());
    let calls = Arc::new(AtomicU32::new(0));

    let mut first = paged_view(&cache, &calls);
    first.start();
    first.settled().await;

    let mut second = paged_view(&cache, &calls);
    second.start();
    assert!(!second.is_loading());
    assert_eq!(second.pages().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_view_waiting_on_another_views_page_sees_it() {
    let cache: Arc<QueryCache> = Arc::new(QueryCache::default());
    let calls = Arc::new(AtomicU32::new(0));

    let mut browser = paged_view(&cache, &calls);
    browser.start();
    browser.settled().await;

    let mut search = paged_view(&cache, &calls);
    search.start();
    assert_eq!(search.pages().len(), 1);

    browser.fetch_next_page();
    tokio::time::sleep(Duration::from_millis(5)).await;
    // Lands on the request the browser already started
    search.fetch_next_page();

    search.settled().await;
    browser.settled().await;
    assert_eq!(search.pages().len(), 2);
    assert_eq!(browser.pages().len(), 2);
    assert_eq!(search.pages()[1].results, vec![3]);
    assert!(!search.has_next_page());

    search.fetch_next_page();
    assert!(!search.poll());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_infinite_query_decode_error() {
    let cache: Arc<QueryCache> = Arc::new(QueryCache::default());
    let next_cache = Arc::clone(&cache);
    let snapshot_cache = Arc::clone(&cache);

    let mut view: InfiniteQuery<Page> = InfiniteQuery::new(
      "list",
      move || {
        let cache = Arc::clone(&next_cache);
        async move {
          cache
            .fetch_next_page("list", "page1", |_| async {
              Ok(json!({"next": null, "results": "not a list"}))
            })
            .await
        }
      },
      move || snapshot_cache.page_snapshot("list"),
    );

    view.start();
    view.settled().await;

    assert!(view.pages().is_empty());
    assert!(matches!(view.error(), Some(FetchError::Decode { .. })));
  }
}
