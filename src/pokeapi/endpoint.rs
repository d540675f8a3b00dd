//! Endpoint catalog and path template resolution.
//!
//! Every endpoint the application talks to is declared here as a type with a
//! fixed path template and the payload shape it returns. Adding an endpoint
//! means adding a type, so a template can never be paired with the wrong
//! payload.

use serde::de::DeserializeOwned;

use super::api_types::{NamedResourceList, Pokemon, PokemonSpecies};

/// A PokeAPI endpoint with a known payload shape.
pub trait Endpoint: Send + Sync + 'static {
  /// Path template relative to the API base URL, with `{name}` placeholders.
  const TEMPLATE: &'static str;

  /// The decoded response body.
  type Payload: DeserializeOwned + Send + 'static;
}

/// First page of the Pokémon listing (21 entries per page).
pub struct PokemonList;

impl Endpoint for PokemonList {
  const TEMPLATE: &'static str = "/pokemon?limit=21";
  type Payload = NamedResourceList;
}

/// A single Pokémon, parameterized by `id`.
pub struct PokemonDetail;

impl Endpoint for PokemonDetail {
  const TEMPLATE: &'static str = "/pokemon/{id}";
  type Payload = Pokemon;
}

/// Species data (flavor text), parameterized by `id`.
pub struct PokemonSpeciesDetail;

impl Endpoint for PokemonSpeciesDetail {
  const TEMPLATE: &'static str = "/pokemon-species/{id}";
  type Payload = PokemonSpecies;
}

/// Substitute `{key}` placeholders in `template` with the supplied values.
///
/// Every occurrence of each placeholder is replaced. Placeholders with no
/// matching entry are left as-is.
pub fn resolve_path(template: &str, params: &[(&str, &str)]) -> String {
  params
    .iter()
    .fold(template.to_string(), |path, (key, value)| {
      path.replace(&format!("{{{}}}", key), value)
    })
}
