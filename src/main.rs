mod app;
mod assets;
mod cache;
mod config;
mod connectivity;
mod error;
mod restaurants;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::app::App;
use crate::assets::{AssetWorker, HttpFetcher, Lifecycle, SqliteGenerations};
use crate::cache::SqliteStorage;
use crate::config::{Config, ConnectivityMode};
use crate::connectivity::RuntimeConnectivity;
use crate::restaurants::urls;
use crate::restaurants::{CachedRestaurantClient, Restaurant, RestaurantClient};

#[derive(Parser, Debug)]
#[command(name = "rdir")]
#[command(about = "Restaurant directory that keeps working offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/rdir/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Serve everything from the offline store
  #[arg(long, conflicts_with = "online")]
  offline: bool,

  /// Skip the connectivity probe and always use the network
  #[arg(long)]
  online: bool,

  /// Restaurant API base URL
  #[arg(long)]
  api_url: Option<String>,

  /// Also write logs to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List restaurants, optionally filtered
  List {
    #[arg(long)]
    cuisine: Option<String>,
    #[arg(long)]
    neighborhood: Option<String>,
    /// Print JSON instead of one line per restaurant
    #[arg(long)]
    json: bool,
  },
  /// Show one restaurant by id or detail-page URL
  Show { target: String },
  /// List all neighborhoods
  Neighborhoods,
  /// List all cuisines
  Cuisines,
  /// Manage the static asset cache
  Assets {
    /// Override the configured cache version
    #[arg(long)]
    version: Option<u32>,
    #[command(subcommand)]
    command: AssetCommand,
  },
}

#[derive(Subcommand, Debug)]
enum AssetCommand {
  /// Populate the current generation from the manifest
  Install,
  /// Delete all other generations of this application
  Activate,
  /// Fetch a URL through the cache and write the body to stdout
  Fetch { url: String },
  /// List cache generations
  Generations,
  /// List keys in the current generation
  Keys,
}

type DirectoryApp = App<SqliteStorage, RuntimeConnectivity, RestaurantClient>;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging(args.verbose)?;

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.url = url;
  }
  if args.offline {
    config.connectivity.mode = ConnectivityMode::Offline;
  } else if args.online {
    config.connectivity.mode = ConnectivityMode::Online;
  }

  match args.command {
    Command::Assets { version, command } => {
      if let Some(version) = version {
        config.assets.version = version;
      }
      run_assets(&config, command).await
    }
    Command::List {
      cuisine,
      neighborhood,
      json,
    } => {
      let mut app = build_app(&config)?;
      let result = app
        .update_restaurants(cuisine.as_deref(), neighborhood.as_deref())
        .await
        .map_err(with_hint)?;
      if json {
        println!("{}", serde_json::to_string_pretty(result)?);
      } else {
        for restaurant in result {
          print_summary(restaurant);
        }
      }
      Ok(())
    }
    Command::Show { target } => {
      let mut app = build_app(&config)?;
      let restaurant = match target.parse::<u64>() {
        Ok(id) => app.restaurant_by_id(id).await,
        Err(_) => app.restaurant_from_url(&target).await,
      }
      .map_err(with_hint)?;
      println!("{}", serde_json::to_string_pretty(restaurant)?);
      println!("image: {}", urls::image_url_for_restaurant(restaurant));
      println!("srcset: {}", urls::image_srcset_for_restaurant(restaurant));
      println!("sizes: {}", urls::image_sizes_for_restaurant(restaurant));
      Ok(())
    }
    Command::Neighborhoods => {
      let mut app = build_app(&config)?;
      app.load_filters().await.map_err(with_hint)?;
      for neighborhood in app.neighborhoods() {
        println!("{}", neighborhood);
      }
      Ok(())
    }
    Command::Cuisines => {
      let mut app = build_app(&config)?;
      app.load_filters().await.map_err(with_hint)?;
      for cuisine in app.cuisines() {
        println!("{}", cuisine);
      }
      Ok(())
    }
  }
}

/// Point at the offline store when the network was the problem.
fn with_hint(err: error::Error) -> color_eyre::Report {
  if err.is_network() {
    eyre!("{}\nRun with --offline to use the offline store.", err)
  } else {
    err.into()
  }
}

fn init_logging(verbose: bool) -> Result<WorkerGuard> {
  let log_dir = Config::data_dir()?.join("logs");
  let file_appender = tracing_appender::rolling::daily(log_dir, "rdir.log");
  let (writer, guard) = tracing_appender::non_blocking(file_appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rdir=info"));
  let stderr_layer = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .with(stderr_layer)
    .init();

  Ok(guard)
}

fn build_app(config: &Config) -> Result<DirectoryApp> {
  let api = RestaurantClient::new(&config.api)?;
  let connectivity = RuntimeConnectivity::from_config(&config.connectivity, api.base());
  let storage = SqliteStorage::open(&config.store_path()?)?;

  let client = CachedRestaurantClient::new(
    api,
    storage,
    connectivity,
    config.connectivity.min_downlink_mbps,
  );
  Ok(App::new(client))
}

fn print_summary(restaurant: &Restaurant) {
  println!(
    "{}\t{}\t{}\t{}\t{}",
    restaurant.id,
    restaurant.name.as_deref().unwrap_or("-"),
    restaurant.neighborhood.as_deref().unwrap_or("-"),
    restaurant.cuisine_type.as_deref().unwrap_or("-"),
    urls::url_for_restaurant(restaurant)
  );
}

async fn run_assets(config: &Config, command: AssetCommand) -> Result<()> {
  let storage = Arc::new(SqliteGenerations::open_at(&config.assets_path()?)?);
  let fetcher = HttpFetcher::new(config.assets.timeout(), config.assets.origin.clone())?;
  let mut worker = AssetWorker::resume(storage, fetcher, config.assets.clone())?;

  match command {
    AssetCommand::Install => {
      let count = worker.install().await?;
      println!("{}: {} entries", worker.generation(), count);
    }
    AssetCommand::Activate => {
      for name in worker.activate().await? {
        println!("deleted {}", name);
      }
      println!("active {}", worker.generation());
    }
    AssetCommand::Fetch { url } => {
      if worker.state() == Lifecycle::Installing {
        return Err(eyre!(
          "{} is not installed; run `rdir assets install` first",
          worker.generation()
        ));
      }
      if worker.state() == Lifecycle::Installed {
        worker.activate().await?;
      }

      let response = worker.intercept(&url).await?;
      info!(
        url = %response.url,
        status = response.status,
        content_type = response.header("content-type").unwrap_or("-"),
        digest = %response.digest(),
        "Served"
      );
      std::io::stdout().write_all(&response.body)?;
    }
    AssetCommand::Generations => {
      let current = worker.generation();
      for name in worker.generations()? {
        let marker = if name == current { "*" } else { " " };
        println!("{} {}", marker, name);
      }
    }
    AssetCommand::Keys => {
      for key in worker.keys()? {
        println!("{}", key);
      }
      info!(origin = %worker.config().origin, "Listed keys");
    }
  }
  Ok(())
}
