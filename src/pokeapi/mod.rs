pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod endpoint;
pub mod shape;

pub use cached_client::PokeApi;
pub use client::HttpClient;
pub use endpoint::{resolve_path, Endpoint, PokemonDetail, PokemonList, PokemonSpeciesDetail};
