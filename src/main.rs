// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// - config:    Config file, environment and CLI settings
// - schema:    Search API request/response types
// - util:      City list loading and output writing
// - places:    Place search backends (Google Places)
// - collector: Pagination and aggregation loop
// - metrics:   Run summary counters
//
mod config;
mod schema;
mod util;
mod places;
mod collector;
mod metrics;

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::Context;
use clap::Parser;
use env_logger::{Env, Target};
use log::{info, warn};

use collector::runner::fetch_all_queries;
use config::{Cli, Config, LoggingConfig};
use places::{GooglePlacesClient, PlaceSearch};

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// One batch run:
// - Resolve configuration (file, .env, environment, flags)
// - Initialize logging
// - Build queries from the city list
// - Collect places for every query
// - Write the aggregated list once
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine, the variables may come from the shell
    let dotenv = dotenvy::dotenv();

    let config = Config::resolve(&cli, |name| std::env::var(name).ok())?;
    init_logging(&config.logging)?;

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let search = GooglePlacesClient::new(&config.api)?;
    info!("Using {} at {}", search.name(), config.api.url);

    let queries = util::load_queries(
        &config.input.cities_file,
        &config.input.cities_key,
        &config.input.spot_types,
    );
    if queries.is_empty() {
        warn!("No queries to run, output will be empty");
    }

    let collection = fetch_all_queries(&search, &queries, &config.collector).await;

    util::write_places(&config.output.path, &collection.places, config.output.pretty)?;
    info!(
        "Wrote {} places to {}",
        collection.places.len(),
        config.output.path.display()
    );

    if collection.summary.is_clean() {
        info!("{}", collection.summary);
    } else {
        warn!("{}", collection.summary);
    }

    Ok(())
}

// ------------------------------------------------------------
// Logging
// ------------------------------------------------------------
//
// `RUST_LOG` overrides the configured filter. With `logging.file`
// set, lines are appended to that file instead of stderr.
//
fn init_logging(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(cfg.filter.as_str()));

    if let Some(path) = &cfg.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        let pipe: Box<dyn Write + Send + 'static> = Box::new(file);
        builder.target(Target::Pipe(pipe));
    }

    builder.try_init().context("initializing logger")
}
