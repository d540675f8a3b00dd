mod app;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use pokedex::{config, logging};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pokedex")]
#[command(about = "Browse the PokeAPI species catalog from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pokedex/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List Pokémon, one page of 21 at a time
  List {
    /// Number of pages to fetch
    #[arg(short, long, default_value_t = 1)]
    pages: u32,

    /// Only show entries whose name contains this text, or whose id matches it
    #[arg(short, long)]
    search: Option<String>,
  },
  /// Show one Pokémon in detail
  Show {
    /// National dex number
    id: String,
  },
  /// Manage the persistent cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Delete every persisted payload
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = logging::init()?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let command = match args.command {
    Command::List { pages, search } => app::Command::List { pages, search },
    Command::Show { id } => app::Command::Show { id },
    Command::Cache {
      action: CacheAction::Clear,
    } => app::Command::ClearCache,
  };

  let output = app::run(&config, command).await?;
  print!("{}", output);

  Ok(())
}
