//! Pure helpers that turn raw PokeAPI payloads into display-ready values.

use std::fmt::Display;

use super::api_types::{NamedResource, PokemonSpecies, Sprites};

/// Highest national dex number the detail view navigates to.
pub const MAX_POKEMON_ID: u32 = 1025;

/// Extract the numeric id from a resource URL like `.../pokemon-species/7/`.
///
/// The id is the second-to-last `/`-separated segment, so the trailing slash
/// the API always sends is required.
pub fn pokemon_id_from_url(url: &str) -> Option<u32> {
  let segments: Vec<&str> = url.split('/').collect();
  let idx = segments.len().checked_sub(2)?;
  segments[idx].parse().ok()
}

/// Official artwork image URL for a Pokémon id.
pub fn artwork_url(id: impl Display) -> String {
  format!(
    "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/{}.png",
    id
  )
}

/// Format a value the API encodes in tenths (weight, height) with one decimal.
pub fn format_number(num: u32) -> String {
  format!("{:.1}", num as f64 / 10.0)
}

/// `#007`-style dex number.
pub fn dex_number(id: u32) -> String {
  format!("#{:03}", id)
}

/// Capitalize the first letter of an API name.
pub fn display_name(name: &str) -> String {
  let mut chars = name.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

// ============================================================================
// Sprites
// ============================================================================

/// The sprite variants a Pokémon may have, in display priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteKind {
  Artwork,
  Front,
  FrontShiny,
  Back,
  BackShiny,
  FrontFemale,
  FrontShinyFemale,
  BackFemale,
  BackShinyFemale,
}

impl SpriteKind {
  pub const ALL: [SpriteKind; 9] = [
    SpriteKind::Artwork,
    SpriteKind::Front,
    SpriteKind::FrontShiny,
    SpriteKind::Back,
    SpriteKind::BackShiny,
    SpriteKind::FrontFemale,
    SpriteKind::FrontShinyFemale,
    SpriteKind::BackFemale,
    SpriteKind::BackShinyFemale,
  ];

  pub fn label(self) -> &'static str {
    match self {
      SpriteKind::Artwork => "Artwork",
      SpriteKind::Front => "Front",
      SpriteKind::FrontShiny => "Front Shiny",
      SpriteKind::Back => "Back",
      SpriteKind::BackShiny => "Back Shiny",
      SpriteKind::FrontFemale => "Front Female",
      SpriteKind::FrontShinyFemale => "Front Shiny Female",
      SpriteKind::BackFemale => "Back Female",
      SpriteKind::BackShinyFemale => "Back Shiny Female",
    }
  }

  fn url(self, sprites: &Sprites) -> Option<&str> {
    let field = match self {
      SpriteKind::Artwork => sprites
        .other
        .as_ref()
        .and_then(|o| o.official_artwork.as_ref())
        .and_then(|a| a.front_default.as_ref()),
      SpriteKind::Front => sprites.front_default.as_ref(),
      SpriteKind::FrontShiny => sprites.front_shiny.as_ref(),
      SpriteKind::Back => sprites.back_default.as_ref(),
      SpriteKind::BackShiny => sprites.back_shiny.as_ref(),
      SpriteKind::FrontFemale => sprites.front_female.as_ref(),
      SpriteKind::FrontShinyFemale => sprites.front_shiny_female.as_ref(),
      SpriteKind::BackFemale => sprites.back_female.as_ref(),
      SpriteKind::BackShinyFemale => sprites.back_shiny_female.as_ref(),
    };
    field.map(String::as_str).filter(|s| !s.is_empty())
  }
}

/// A sprite that is actually present on a Pokémon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
  pub kind: SpriteKind,
  pub label: &'static str,
  pub uri: String,
}

/// List the sprites present on `sprites`, in `SpriteKind::ALL` order.
pub fn available_sprites(sprites: Option<&Sprites>) -> Vec<Sprite> {
  let Some(sprites) = sprites else {
    return Vec::new();
  };

  SpriteKind::ALL
    .iter()
    .filter_map(|&kind| {
      kind.url(sprites).map(|uri| Sprite {
        kind,
        label: kind.label(),
        uri: uri.to_string(),
      })
    })
    .collect()
}

// ============================================================================
// Stats
// ============================================================================

/// Base stats with a short display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatKind {
  Hp,
  Attack,
  Defense,
  SpecialAttack,
  SpecialDefense,
  Speed,
  Other(String),
}

impl StatKind {
  pub fn from_api_name(name: &str) -> Self {
    match name {
      "hp" => StatKind::Hp,
      "attack" => StatKind::Attack,
      "defense" => StatKind::Defense,
      "special-attack" => StatKind::SpecialAttack,
      "special-defense" => StatKind::SpecialDefense,
      "speed" => StatKind::Speed,
      other => StatKind::Other(other.to_string()),
    }
  }

  pub fn label(&self) -> String {
    match self {
      StatKind::Hp => "HP".to_string(),
      StatKind::Attack => "ATK".to_string(),
      StatKind::Defense => "DEF".to_string(),
      StatKind::SpecialAttack => "SATK".to_string(),
      StatKind::SpecialDefense => "SDEF".to_string(),
      StatKind::Speed => "SPD".to_string(),
      StatKind::Other(name) => name.to_uppercase(),
    }
  }
}

/// Base stat as a percentage of the 255 maximum.
pub fn stat_percent(base_stat: u32) -> f64 {
  (base_stat.min(255) as f64 / 255.0) * 100.0
}

// ============================================================================
// Species and navigation
// ============================================================================

/// First English flavor text, flattened to a single line.
pub fn english_flavor_text(species: &PokemonSpecies) -> Option<String> {
  species
    .flavor_text_entries
    .iter()
    .find(|entry| entry.language.name == "en")
    .map(|entry| entry.flavor_text.replace('\n', ". "))
}

/// Parse an id from user input, falling back to the first Pokémon.
pub fn parse_dex_id(input: &str) -> u32 {
  input.trim().parse().unwrap_or(1)
}

/// Previous/current/next ids for swipe-style navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DexNavigation {
  pub prev: u32,
  pub current: u32,
  pub next: u32,
}

impl DexNavigation {
  /// The requested id is kept as given; only its neighbours are clamped
  /// to the national dex range.
  pub fn around(id: u32) -> Self {
    Self {
      prev: id.saturating_sub(1).max(1),
      current: id,
      next: id.saturating_add(1).min(MAX_POKEMON_ID),
    }
  }

  pub fn has_prev(&self) -> bool {
    self.prev < self.current
  }

  pub fn has_next(&self) -> bool {
    self.next > self.current
  }
}

/// Whether a list entry matches a search query (name substring or exact id).
pub fn matches_search(entry: &NamedResource, query: &str) -> bool {
  let query = query.trim().to_lowercase();
  if query.is_empty() {
    return true;
  }
  entry.name.to_lowercase().contains(&query)
    || pokemon_id_from_url(&entry.url).is_some_and(|id| id.to_string() == query)
}
