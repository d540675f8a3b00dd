//! Cached PokeAPI client that wraps the HTTP transport with the query cache.

use color_eyre::Result;
use std::sync::Arc;

use crate::cache::{CacheStorage, EntryStatus, NoopStorage, PageFetch, QueryCache};
use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::query::{decode_payload, InfiniteQuery, Query};

use super::api_types::{NamedResourceList, Pokemon, PokemonSpecies};
use super::client::HttpClient;
use super::endpoint::{
  resolve_path, Endpoint, PokemonDetail, PokemonList, PokemonSpeciesDetail,
};

/// PokeAPI client with transparent caching.
///
/// Cloning is cheap; clones share one cache. Single resources are cached by
/// resolved path, paginated listings by endpoint template.
pub struct PokeApi<S: CacheStorage = NoopStorage> {
  http: HttpClient,
  cache: Arc<QueryCache<S>>,
}

impl PokeApi<NoopStorage> {
  /// Client with an in-memory cache that lives as long as the process.
  pub fn new(config: &ApiConfig) -> Result<Self> {
    Ok(Self::with_cache(
      HttpClient::new(config)?,
      Arc::new(QueryCache::default()),
    ))
  }
}

impl<S: CacheStorage> PokeApi<S> {
  pub fn with_cache(http: HttpClient, cache: Arc<QueryCache<S>>) -> Self {
    Self { http, cache }
  }

  pub fn cache(&self) -> &Arc<QueryCache<S>> {
    &self.cache
  }

  /// Fetch a single resource.
  ///
  /// The first call for a resolved path issues the request; every later (or
  /// concurrent) call with the same path shares its result.
  pub async fn fetch<E: Endpoint>(
    &self,
    params: &[(&str, &str)],
  ) -> Result<E::Payload, FetchError> {
    let path = resolve_path(E::TEMPLATE, params);
    let http = self.http.clone();
    let request_path = path.clone();

    let value = self
      .cache
      .get_or_fetch(&path, move || async move { http.get_path(&request_path).await })
      .await?;

    decode_payload(&path, &value)
  }

  /// Start a single-resource query view.
  pub fn query<E: Endpoint>(&self, params: &[(&str, &str)]) -> Query<E::Payload> {
    let api = self.clone();
    let params: Vec<(String, String)> = params
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();

    let mut query = Query::new(move || {
      let api = api.clone();
      let params = params.clone();
      async move {
        let params: Vec<(&str, &str)> = params
          .iter()
          .map(|(k, v)| (k.as_str(), v.as_str()))
          .collect();
        api.fetch::<E>(&params).await
      }
    });
    query.fetch();
    query
  }

  /// Status of the cache entry a `fetch` with these params would use.
  pub fn status<E: Endpoint>(&self, params: &[(&str, &str)]) -> Option<EntryStatus> {
    self.cache.status(&resolve_path(E::TEMPLATE, params))
  }

  /// Forget the cached result for a single resource.
  pub fn invalidate<E: Endpoint>(&self, params: &[(&str, &str)]) {
    self.cache.invalidate(&resolve_path(E::TEMPLATE, params));
  }

  /// Fetch the next page of a paginated endpoint.
  ///
  /// The first page comes from the base URL plus the endpoint template,
  /// later pages from the previous page's `next` URL.
  pub async fn fetch_next_page<E: Endpoint>(&self) -> Result<PageFetch, FetchError> {
    let initial_url = self.http.url_for(E::TEMPLATE);
    let http = self.http.clone();

    self
      .cache
      .fetch_next_page(E::TEMPLATE, &initial_url, move |url| async move {
        http.get_url(&url).await
      })
      .await
  }

  /// Every page of a paginated endpoint fetched so far.
  pub fn pages<E: Endpoint>(&self) -> Result<Vec<E::Payload>, FetchError> {
    let Some(snapshot) = self.cache.page_snapshot(E::TEMPLATE) else {
      return Ok(Vec::new());
    };
    snapshot
      .pages
      .iter()
      .map(|page| decode_payload(E::TEMPLATE, page))
      .collect()
  }

  /// Whether a paginated endpoint has more pages to fetch.
  pub fn has_next_page<E: Endpoint>(&self) -> bool {
    self
      .cache
      .page_snapshot(E::TEMPLATE)
      .map_or(true, |snapshot| snapshot.has_next_page)
  }

  /// Start a paginated query view. The first page is requested unless the
  /// cache already holds pages for this endpoint.
  pub fn infinite_query<E: Endpoint>(&self) -> InfiniteQuery<E::Payload> {
    let api = self.clone();
    let cache = Arc::clone(&self.cache);

    let mut query = InfiniteQuery::new(
      E::TEMPLATE,
      move || {
        let api = api.clone();
        async move { api.fetch_next_page::<E>().await }
      },
      move || cache.page_snapshot(E::TEMPLATE),
    );
    query.start();
    query
  }

  // ==========================================================================
  // Typed shortcuts for the endpoints the application uses
  // ==========================================================================

  pub async fn pokemon(&self, id: u32) -> Result<Pokemon, FetchError> {
    let id = id.to_string();
    self.fetch::<PokemonDetail>(&[("id", id.as_str())]).await
  }

  pub async fn species(&self, id: u32) -> Result<PokemonSpecies, FetchError> {
    let id = id.to_string();
    self
      .fetch::<PokemonSpeciesDetail>(&[("id", id.as_str())])
      .await
  }

  pub async fn next_list_page(&self) -> Result<PageFetch, FetchError> {
    self.fetch_next_page::<PokemonList>().await
  }

  pub fn list_pages(&self) -> Result<Vec<NamedResourceList>, FetchError> {
    self.pages::<PokemonList>()
  }
}

impl<S: CacheStorage> Clone for PokeApi<S> {
  fn clone(&self) -> Self {
    Self {
      http: self.http.clone(),
      cache: Arc::clone(&self.cache),
    }
  }
}
