//! `flightsearch` - CLI for the flight search library
//!
//! This binary searches the airport catalog, lists flights from an origin
//! and manages favorite flights.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};

use flightsearch::cli::output::{render_airports, render_flights};
use flightsearch::cli::{Cli, Command, ConfigCommand};
use flightsearch::live::{Live, LiveState};
use flightsearch::model::{Airport, Flight, NOT_FAVORITE_ID};
use flightsearch::repository::FlightsRepository;
use flightsearch::storage::migrations::CURRENT_VERSION;
use flightsearch::{
    init_logging, Config, Error, FlightQueryService, SchemaStatus, SqliteRepository, Storage,
    ToggleEvent, ViewStateCoordinator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    // These must work even when the active configuration is broken
    match &cli.command {
        Command::Config(ConfigCommand::Path) => {
            println!("{}", Config::default_config_path().display());
            return Ok(());
        }
        Command::Config(ConfigCommand::Validate { file }) => {
            return handle_validate(file.clone().or_else(|| cli.config.clone()));
        }
        _ => {}
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Config(ConfigCommand::Show { json }) => handle_config_show(&config, json),
        // Path and Validate are handled above
        Command::Config(_) => Ok(()),
        Command::Status(cmd) => handle_status(&config, cmd.json).await,
        Command::Airports(cmd) => {
            let app = App::open(&config)?;
            let mut airports = ready(app.query.all_airports()).await?;
            if let Some(limit) = cmd.limit {
                airports.truncate(limit);
            }
            print!("{}", render_airports(&airports, cmd.format)?);
            Ok(())
        }
        Command::Search(cmd) => {
            let app = App::open(&config)?;
            let mut view = app.coordinator(&config);
            view.update_search_text(cmd.term.as_str());
            ready(view.suggestions_stream()).await?;
            print!("{}", render_airports(&view.suggestions(), cmd.format)?);
            Ok(())
        }
        Command::From(cmd) => {
            let app = App::open(&config)?;
            let origin = app.airport(&cmd.origin).await?;
            let mut view = app.coordinator(&config);
            view.select_origin(&origin);
            view.flights_from_origin_stream().settled().await?;
            if let Some(err) = view.list_error() {
                bail!("could not list flights from {}: {err}", origin.iata_code);
            }
            print!("{}", render_flights(&view.flights_from_origin(), cmd.format)?);
            Ok(())
        }
        Command::Favorites(cmd) => {
            let app = App::open(&config)?;
            let view = app.coordinator(&config);
            view.favorites_stream().settled().await?;
            if let Some(err) = view.list_error() {
                bail!("could not list favorites: {err}");
            }
            for issue in view.favorite_issues() {
                eprintln!("warning: {issue}");
            }
            print!("{}", render_flights(&view.favorite_flights(), cmd.format)?);
            Ok(())
        }
        Command::Toggle(cmd) => {
            let app = App::open(&config)?;
            handle_toggle(&app, &config, &cmd.from, &cmd.to).await
        }
    }
}

/// Opened database plus the services built on it.
struct App {
    repo: Arc<SqliteRepository>,
    query: FlightQueryService,
}

impl App {
    fn open(config: &Config) -> anyhow::Result<Self> {
        let path = config.database_path();
        let mut storage = Storage::open(&path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        if let SchemaStatus::Recreated { from_version } = storage.schema_status() {
            warn!(
                "Database schema v{} replaced with v{}; favorites were reset",
                from_version, CURRENT_VERSION
            );
        }

        let source = config.seed_source();
        let seeded = storage
            .seed_if_empty(&source)
            .with_context(|| format!("failed to seed airports from {}", source.describe()))?;
        if seeded > 0 {
            info!("Seeded {} airports from {}", seeded, source.describe());
        }

        let repo = Arc::new(SqliteRepository::new(storage, config.favorites.on_duplicate));
        let query = FlightQueryService::new(Arc::clone(&repo) as Arc<dyn FlightsRepository>);
        Ok(Self { repo, query })
    }

    fn coordinator(&self, config: &Config) -> ViewStateCoordinator {
        ViewStateCoordinator::new(self.query.clone())
            .with_max_suggestions(config.search.max_suggestions)
    }

    async fn airport(&self, code: &str) -> anyhow::Result<Airport> {
        let code = code.to_uppercase();
        match self.repo.airport_by_iata(&code).await? {
            Some(airport) => Ok(airport),
            None => Err(Error::unknown_airport(code).into()),
        }
    }
}

/// Wait for the first result of `live`.
async fn ready<T>(mut live: Live<T>) -> anyhow::Result<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    match live.settled().await? {
        LiveState::Ready(snapshot) => Ok(snapshot.items),
        LiveState::Failed(err) => bail!("query failed: {err}"),
        LiveState::Pending => bail!("query produced no result"),
    }
}

async fn handle_toggle(app: &App, config: &Config, from: &str, to: &str) -> anyhow::Result<()> {
    let from = app.airport(from).await?;
    let to = app.airport(to).await?;
    if from.iata_code == to.iata_code {
        bail!("departure and destination must differ");
    }

    let favorite = app.repo.favorite_id(&from.iata_code, &to.iata_code).await?;
    let flight = Flight {
        id: favorite.unwrap_or(NOT_FAVORITE_ID),
        is_favorite: favorite.is_some(),
        from,
        to,
    };

    let mut view = app.coordinator(config);
    view.toggle_favorite(&flight);
    match view.next_completion().await {
        Some(ToggleEvent::Confirmed {
            key,
            is_favorite: true,
            id,
            ..
        }) => println!("Added favorite {key} (id {id})"),
        Some(ToggleEvent::Confirmed { key, .. }) => println!("Removed favorite {key}"),
        Some(ToggleEvent::Failed { key, error, .. }) => {
            bail!("could not toggle {key}: {error}")
        }
        None => bail!("toggle did not complete"),
    }
    Ok(())
}

async fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let app = App::open(config)?;
    let stats = app.repo.stats().await?;

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "schema_version": CURRENT_VERSION,
            "airports": stats.airports,
            "favorites": stats.favorites,
            "db_size_bytes": stats.db_size_bytes,
            "on_duplicate": config.favorites.on_duplicate,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("flightsearch status");
        println!("-------------------");
        println!("Database:      {}", config.database_path().display());
        println!("Schema:        v{CURRENT_VERSION}");
        println!("Airports:      {}", stats.airports);
        println!("Favorites:     {}", stats.favorites);
        println!("Size:          {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_config_show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Storage]");
    println!("  Database path:      {}", config.database_path().display());
    println!("  Seed:               {}", config.seed_source().describe());
    println!();
    println!("[Favorites]");
    println!("  On duplicate:       {}", config.favorites.on_duplicate);
    println!();
    println!("[Search]");
    if config.search.max_suggestions == 0 {
        println!("  Max suggestions:    unlimited");
    } else {
        println!("  Max suggestions:    {}", config.search.max_suggestions);
    }
    Ok(())
}

fn handle_validate(path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => bail!("configuration error: {e}"),
    }
    Ok(())
}
