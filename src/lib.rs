//! Typed, cached access to the PokeAPI species catalog.
//!
//! [`pokeapi::PokeApi`] is the entry point: it resolves endpoint templates,
//! deduplicates requests through a shared [`cache::QueryCache`], and hands
//! out [`query::Query`] / [`query::InfiniteQuery`] views for event-loop
//! driven consumers. [`pokeapi::shape`] turns payloads into display values.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod pokeapi;
pub mod query;

pub use error::FetchError;
