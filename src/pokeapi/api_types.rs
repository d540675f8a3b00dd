//! Serde-deserializable types matching PokeAPI responses.
//!
//! Only the fields the application reads are declared; everything else in
//! the response body is ignored.

use serde::{Deserialize, Serialize};

// ============================================================================
// Shared nested types
// ============================================================================

/// A `{name, url}` reference to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamedResource {
  pub name: String,
  pub url: String,
}

// ============================================================================
// /pokemon?limit=21
// ============================================================================

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamedResourceList {
  pub count: u32,
  pub next: Option<String>,
  #[serde(default)]
  pub previous: Option<String>,
  pub results: Vec<NamedResource>,
}

// ============================================================================
// /pokemon/{id}
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Pokemon {
  pub id: u32,
  pub name: String,
  /// Decimetres
  pub height: u32,
  /// Hectograms
  pub weight: u32,
  pub types: Vec<PokemonTypeSlot>,
  pub abilities: Vec<PokemonAbility>,
  pub stats: Vec<PokemonStat>,
  pub sprites: Sprites,
  #[serde(default)]
  pub moves: Vec<PokemonMove>,
  pub cries: Option<Cries>,
}

impl Pokemon {
  /// Type names ordered by slot, primary type first.
  pub fn type_names(&self) -> Vec<&str> {
    let mut slots: Vec<_> = self.types.iter().collect();
    slots.sort_by_key(|t| t.slot);
    slots.iter().map(|t| t.type_ref.name.as_str()).collect()
  }

  /// Names of the first `n` moves in API order.
  pub fn first_moves(&self, n: usize) -> Vec<&str> {
    self
      .moves
      .iter()
      .take(n)
      .map(|m| m.move_ref.name.as_str())
      .collect()
  }

  /// URL of the latest cry audio, if the API provides one.
  pub fn cry_url(&self) -> Option<&str> {
    self.cries.as_ref().and_then(|c| c.latest.as_deref())
  }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PokemonTypeSlot {
  pub slot: u32,
  #[serde(rename = "type")]
  pub type_ref: NamedResource,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PokemonAbility {
  pub ability: NamedResource,
  #[serde(default)]
  pub is_hidden: bool,
  pub slot: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PokemonStat {
  pub base_stat: u32,
  #[serde(default)]
  pub effort: u32,
  pub stat: NamedResource,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PokemonMove {
  #[serde(rename = "move")]
  pub move_ref: NamedResource,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Cries {
  pub latest: Option<String>,
  pub legacy: Option<String>,
}

/// Sprite URLs. Every variant is optional; the API sends `null` for
/// variants that don't exist.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Sprites {
  pub front_default: Option<String>,
  pub front_shiny: Option<String>,
  pub back_default: Option<String>,
  pub back_shiny: Option<String>,
  pub front_female: Option<String>,
  pub front_shiny_female: Option<String>,
  pub back_female: Option<String>,
  pub back_shiny_female: Option<String>,
  #[serde(default)]
  pub other: Option<OtherSprites>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OtherSprites {
  #[serde(rename = "official-artwork")]
  pub official_artwork: Option<ArtworkSprites>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArtworkSprites {
  pub front_default: Option<String>,
}

// ============================================================================
// /pokemon-species/{id}
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PokemonSpecies {
  #[serde(default)]
  pub flavor_text_entries: Vec<FlavorText>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlavorText {
  pub flavor_text: String,
  pub language: NamedResource,
}
