use color_eyre::{eyre::eyre, Result};
use pokedex::cache::{CacheStorage, NoopStorage, PageFetch, QueryCache, SqliteStorage};
use pokedex::config::Config;
use pokedex::pokeapi::api_types::{NamedResource, Pokemon, PokemonSpecies};
use pokedex::pokeapi::shape::{
  available_sprites, artwork_url, dex_number, display_name, english_flavor_text, format_number,
  matches_search, parse_dex_id, pokemon_id_from_url, stat_percent, DexNavigation, StatKind,
};
use pokedex::pokeapi::{HttpClient, PokeApi};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{info, warn};

const STAT_BAR_WIDTH: usize = 20;

/// What the binary was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  List { pages: u32, search: Option<String> },
  Show { id: String },
  ClearCache,
}

/// Run a command and return the text to print.
pub async fn run(config: &Config, command: Command) -> Result<String> {
  let http = HttpClient::new(&config.api)?;

  if config.cache.persist {
    let storage = SqliteStorage::open()?;
    let cache = QueryCache::new(storage).with_max_age(config.max_age());
    execute(PokeApi::with_cache(http, Arc::new(cache)), command).await
  } else {
    execute(PokeApi::with_cache(http, Arc::new(QueryCache::new(NoopStorage))), command).await
  }
}

async fn execute<S: CacheStorage>(api: PokeApi<S>, command: Command) -> Result<String> {
  match command {
    Command::List { pages, search } => list(&api, pages, search.as_deref()).await,
    Command::Show { id } => show(&api, parse_dex_id(&id)).await,
    Command::ClearCache => {
      api
        .cache()
        .clear()
        .map_err(|e| eyre!("Failed to clear cache: {}", e))?;
      Ok("Cache cleared\n".to_string())
    }
  }
}

async fn list<S: CacheStorage>(
  api: &PokeApi<S>,
  pages: u32,
  search: Option<&str>,
) -> Result<String> {
  for _ in 0..pages.max(1) {
    match api.next_list_page().await {
      Ok(PageFetch::Fetched(index)) => info!(index, "list page fetched"),
      Ok(PageFetch::Exhausted) => break,
      Ok(PageFetch::InFlight) => {}
      Err(e) => {
        // Keep whatever pages arrived before the failure
        warn!(error = %e, "list page failed");
        if api.list_pages().map(|p| p.is_empty()).unwrap_or(true) {
          return Err(eyre!("Failed to list Pokémon: {}", e));
        }
        break;
      }
    }
  }

  let entries: Vec<NamedResource> = api
    .list_pages()
    .map_err(|e| eyre!("Failed to list Pokémon: {}", e))?
    .into_iter()
    .flat_map(|page| page.results)
    .collect();

  let mut out = String::new();
  for entry in entries
    .iter()
    .filter(|entry| search.map_or(true, |q| matches_search(entry, q)))
  {
    writeln!(out, "{}", render_list_line(entry))?;
  }
  Ok(out)
}

async fn show<S: CacheStorage>(api: &PokeApi<S>, id: u32) -> Result<String> {
  let nav = DexNavigation::around(id);
  let (pokemon, species) = tokio::join!(api.pokemon(nav.current), api.species(nav.current));

  let pokemon = pokemon.map_err(|e| eyre!("Failed to load Pokémon {}: {}", nav.current, e))?;
  // The detail view works without flavor text
  let species = match species {
    Ok(species) => Some(species),
    Err(e) => {
      warn!(id = nav.current, error = %e, "species unavailable");
      None
    }
  };

  render_detail(&pokemon, species.as_ref(), nav)
}

/// `#001 Bulbasaur` (the id comes from the entry's resource URL).
pub fn render_list_line(entry: &NamedResource) -> String {
  let number = pokemon_id_from_url(&entry.url)
    .map(dex_number)
    .unwrap_or_else(|| "#???".to_string());
  format!("{} {}", number, display_name(&entry.name))
}

pub fn render_detail(
  pokemon: &Pokemon,
  species: Option<&PokemonSpecies>,
  nav: DexNavigation,
) -> Result<String> {
  let mut out = String::new();

  writeln!(out, "{} {}", display_name(&pokemon.name), dex_number(pokemon.id))?;
  writeln!(out, "Types:   {}", pokemon.type_names().join(", "))?;
  writeln!(out, "Weight:  {} kg", format_number(pokemon.weight))?;
  writeln!(out, "Height:  {} m", format_number(pokemon.height))?;
  writeln!(out, "Moves:   {}", pokemon.first_moves(2).join(", "))?;

  if let Some(bio) = species.and_then(english_flavor_text) {
    writeln!(out, "\n{}", bio)?;
  }

  writeln!(out, "\nBase Stats")?;
  for stat in &pokemon.stats {
    let filled = (stat_percent(stat.base_stat) / 100.0 * STAT_BAR_WIDTH as f64).round() as usize;
    writeln!(
      out,
      "  {:<5} {:03} {}{}",
      StatKind::from_api_name(&stat.stat.name).label(),
      stat.base_stat,
      "█".repeat(filled),
      "░".repeat(STAT_BAR_WIDTH - filled)
    )?;
  }

  writeln!(out, "\nSprites")?;
  let sprites = available_sprites(Some(&pokemon.sprites));
  if sprites.is_empty() {
    writeln!(out, "  Artwork: {}", artwork_url(pokemon.id))?;
  }
  for sprite in sprites {
    writeln!(out, "  {}: {}", sprite.label, sprite.uri)?;
  }

  if let Some(cry) = pokemon.cry_url() {
    writeln!(out, "\nCry: {}", cry)?;
  }

  writeln!(out)?;
  if nav.has_prev() {
    write!(out, "< {}  ", dex_number(nav.prev))?;
  }
  if nav.has_next() {
    write!(out, "{} >", dex_number(nav.next))?;
  }
  writeln!(out)?;

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use httpmock::prelude::*;
  use pokedex::config::ApiConfig;
  use serde_json::json;

  fn bulbasaur() -> Pokemon {
    serde_json::from_value(json!({
      "id": 1,
      "name": "bulbasaur",
      "height": 7,
      "weight": 69,
      "types": [
        {"slot": 2, "type": {"name": "poison", "url": "u"}},
        {"slot": 1, "type": {"name": "grass", "url": "u"}}
      ],
      "abilities": [],
      "stats": [
        {"base_stat": 45, "effort": 0, "stat": {"name": "hp", "url": "u"}},
        {"base_stat": 255, "effort": 0, "stat": {"name": "special-attack", "url": "u"}}
      ],
      "sprites": {"front_default": "front.png", "front_shiny": "shiny.png"},
      "moves": [{"move": {"name": "razor-wind", "url": "u"}}],
      "cries": {"latest": "cry.ogg"}
    }))
    .unwrap()
  }

  fn test_config(server: &MockServer) -> Config {
    Config {
      api: ApiConfig {
        base_url: server.base_url(),
        request_delay_ms: 0,
        timeout_secs: 5,
      },
      ..Config::default()
    }
  }

  #[test]
  fn test_render_list_line() {
    let entry = NamedResource {
      name: "bulbasaur".into(),
      url: "https://pokeapi.co/api/v2/pokemon/1/".into(),
    };
    assert_eq!(render_list_line(&entry), "#001 Bulbasaur");

    let odd = NamedResource {
      name: "missingno".into(),
      url: "https://pokeapi.co/api/v2/pokemon/".into(),
    };
    assert_eq!(render_list_line(&odd), "#??? Missingno");
  }

  #[test]
  fn test_render_detail() {
    let out = render_detail(&bulbasaur(), None, DexNavigation::around(1)).unwrap();

    assert!(out.starts_with("Bulbasaur #001\n"));
    assert!(out.contains("Types:   grass, poison"));
    assert!(out.contains("Weight:  6.9 kg"));
    assert!(out.contains("Height:  0.7 m"));
    assert!(out.contains("  HP    045 "));
    assert!(out.contains(&format!("  SATK  255 {}", "█".repeat(STAT_BAR_WIDTH))));
    assert!(out.contains("  Front: front.png\n  Front Shiny: shiny.png"));
    assert!(out.contains("Cry: cry.ogg"));
    assert!(out.trim_end().ends_with("#002 >"));
    assert!(!out.contains("< #001"));
  }

  #[test]
  fn test_render_detail_navigation_both_ways() {
    let out = render_detail(&bulbasaur(), None, DexNavigation::around(25)).unwrap();
    assert!(out.ends_with("\n< #024  #026 >\n"));
  }

  #[tokio::test]
  async fn test_list_with_search() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/pokemon").query_param("limit", "21");
        then.status(200).json_body(json!({
          "count": 2,
          "next": null,
          "results": [
            {"name": "bulbasaur", "url": "https://pokeapi.co/api/v2/pokemon/1/"},
            {"name": "pikachu", "url": "https://pokeapi.co/api/v2/pokemon/25/"}
          ]
        }));
      })
      .await;

    let config = test_config(&server);
    let all = run(
      &config,
      Command::List {
        pages: 3,
        search: None,
      },
    )
    .await
    .unwrap();
    assert_eq!(all, "#001 Bulbasaur\n#025 Pikachu\n");

    let found = run(
      &config,
      Command::List {
        pages: 1,
        search: Some("25".into()),
      },
    )
    .await
    .unwrap();
    assert_eq!(found, "#025 Pikachu\n");
  }

  #[tokio::test]
  async fn test_show_without_species() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/pokemon/1");
        then.status(200).json_body(json!({
          "id": 1,
          "name": "bulbasaur",
          "height": 7,
          "weight": 69,
          "types": [],
          "abilities": [],
          "stats": [],
          "sprites": {}
        }));
      })
      .await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/pokemon-species/1");
        then.status(500);
      })
      .await;

    let out = run(
      &test_config(&server),
      Command::Show {
        id: "not-a-number".into(),
      },
    )
    .await
    .unwrap();

    assert!(out.starts_with("Bulbasaur #001"));
    assert!(out.contains(&artwork_url(1)));
  }
}
