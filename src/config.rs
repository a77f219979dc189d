use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use clap::Parser;
use serde::Deserialize;

/// Config file picked up from the working directory when `--config`
/// is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Environment variable holding the Places API key.
pub const ENV_API_KEY: &str = "API_KEY";

/// Environment variable overriding the search endpoint.
pub const ENV_API_URL: &str = "URL_GOOGLE_APIS_PLACE";

const DEFAULT_API_URL: &str = "https://places.googleapis.com/v1/places:searchText";

const DEFAULT_FIELD_MASK: [&str; 20] = [
    "nextPageToken",
    "places.id",
    "places.name",
    "places.displayName",
    "places.formattedAddress",
    "places.priceLevel",
    "places.attributions",
    "places.location",
    "places.rating",
    "places.userRatingCount",
    "places.servesBreakfast",
    "places.servesBrunch",
    "places.servesCoffee",
    "places.servesDessert",
    "places.servesDinner",
    "places.servesLunch",
    "places.servesVegetarianFood",
    "places.goodForChildren",
    "places.allowsDogs",
    "places.googleMapsLinks",
];

// ------------------------------------------------------------
// Command line
// ------------------------------------------------------------
//
// Every flag is optional. Flags override values coming from the
// config file and the environment.
//
/// Collect place listings for a list of cities from the Google Places
/// text search API and write them to a JSON file.
#[derive(Debug, Parser, Default)]
#[command(version, about)]
pub struct Cli {
    /// JSON config file (defaults to ./config.json when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// City list file
    #[arg(long, value_name = "FILE")]
    pub cities: Option<PathBuf>,

    /// Output file for the collected places
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Query prefix such as "restaurants in ". May be repeated.
    #[arg(long = "spot-type", value_name = "PREFIX")]
    pub spot_types: Vec<String>,

    /// Stop paginating a query once this many places were collected
    #[arg(short, long, value_name = "N")]
    pub max_results: Option<usize>,

    /// Places API key (overrides API_KEY)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,
}

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Built once in `main` before any request is sent and only
// borrowed afterwards.
//
// Sources, lowest precedence first:
// - built-in defaults
// - JSON config file
// - `.env` / process environment
// - command line flags
//
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub input: InputConfig,
    pub collector: CollectorConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Remote search endpoint settings.
///
/// `key` is security-sensitive. Prefer the `API_KEY` environment
/// variable or a `.env` file over committing it to `config.json`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    /// Full URL of the `places:searchText` endpoint
    pub url: String,

    /// API key sent as `X-Goog-Api-Key`
    pub key: Option<String>,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// Response fields, joined into `X-Goog-FieldMask`
    pub field_mask: Vec<String>,

    /// Optional `pageSize` request field
    pub page_size: Option<u32>,

    /// Optional `languageCode` request field
    pub language_code: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            key: None,
            timeout_secs: 10,
            field_mask: DEFAULT_FIELD_MASK.iter().map(|f| f.to_string()).collect(),
            page_size: None,
            language_code: None,
        }
    }
}

/// Where the queries come from.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    /// JSON file holding groups of city names
    pub cities_file: PathBuf,

    /// Top-level key of the city groups inside `cities_file`
    pub cities_key: String,

    /// Prefixes combined with every city, e.g. "restaurants in "
    pub spot_types: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            cities_file: PathBuf::from("cities.json"),
            cities_key: "City".to_string(),
            spot_types: vec!["restaurants in ".to_string()],
        }
    }
}

/// Pagination limits for a single query.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Result cap, checked before each page request
    pub max_results: usize,

    /// Pause between two pages of the same query
    pub page_delay_ms: u64,

    /// Hard ceiling on page requests per query. `null` disables it.
    pub max_pages_per_query: Option<usize>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_results: 60,
            page_delay_ms: 2_000,
            max_pages_per_query: Some(10),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,

    /// Pretty-print the output array
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("places.json"),
            pretty: true,
        }
    }
}

/// env_logger settings. `RUST_LOG` wins over `filter` when set.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives, e.g. "info" or "places_collector=debug"
    pub filter: String,

    /// Append log lines to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Builds the final configuration from every source and validates it.
    ///
    /// `env` looks up a variable by name; `main` passes the process
    /// environment after loading `.env`.
    pub fn resolve<F>(cli: &Cli, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load(cli.config.as_deref())?;
        config.apply_env(env);
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Reads the config file, or falls back to defaults when no explicit
    /// path was given and `config.json` does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Applies `API_KEY` and `URL_GOOGLE_APIS_PLACE`. Empty values are
    /// ignored.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY) {
            self.api.key = Some(key);
        }
        if let Some(url) = non_empty(ENV_API_URL) {
            self.api.url = url;
        }
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(path) = &cli.cities {
            self.input.cities_file = path.clone();
        }
        if let Some(path) = &cli.output {
            self.output.path = path.clone();
        }
        if !cli.spot_types.is_empty() {
            self.input.spot_types = cli.spot_types.clone();
        }
        if let Some(max) = cli.max_results {
            self.collector.max_results = max;
        }
        if let Some(key) = &cli.api_key {
            self.api.key = Some(key.clone());
        }
    }

    /// Rejects settings that would make the run meaningless before any
    /// request goes out.
    pub fn validate(&self) -> Result<()> {
        match self.api.key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => bail!("no API key configured (set {ENV_API_KEY}, api.key or --api-key)"),
        }
        ensure!(!self.api.url.trim().is_empty(), "api.url must not be empty");
        ensure!(self.api.timeout_secs > 0, "api.timeout_secs must be at least 1");
        if let Some(size) = self.api.page_size {
            ensure!(
                (1..=20).contains(&size),
                "api.page_size must be between 1 and 20, got {size}"
            );
        }
        ensure!(
            self.collector.max_results > 0,
            "collector.max_results must be at least 1"
        );
        ensure!(
            self.collector.max_pages_per_query != Some(0),
            "collector.max_pages_per_query must be at least 1 or null"
        );
        ensure!(
            !self.input.spot_types.is_empty(),
            "input.spot_types must contain at least one prefix"
        );
        Ok(())
    }
}
