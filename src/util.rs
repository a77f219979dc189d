//! File helpers around the collector.
//!
//! This module contains:
//! - City list loading and query building
//! - Output file writing
//!
//! Nothing here talks to the network.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{error, info};
use serde_json::Value;

use crate::schema::Place;

/// Combine every spot-type prefix with every city name.
///
/// Order: all cities for the first prefix, then all cities for the
/// next one. Cities keep their order inside and across groups.
///
/// Examples:
/// - (["Poznań", "Kraków"], ["restaurants in "])
///   -> ["restaurants in Poznań", "restaurants in Kraków"]
///
pub fn build_queries(groups: &[Vec<String>], spot_types: &[String]) -> Vec<String> {
    spot_types
        .iter()
        .flat_map(|spot| {
            groups
                .iter()
                .flatten()
                .map(move |city| format!("{spot}{city}"))
        })
        .collect()
}

/// Parse the city groups stored under `key` in a JSON document.
///
/// Expected shape: `{"<key>": [["CityA", "CityB"], ["CityC"]]}`
pub fn parse_city_groups(raw: &str, key: &str) -> Result<Vec<Vec<String>>> {
    let mut doc: Value = serde_json::from_str(raw).context("city list is not valid JSON")?;
    let groups = doc
        .get_mut(key)
        .map(Value::take)
        .with_context(|| format!("city list has no \"{key}\" key"))?;
    serde_json::from_value(groups)
        .with_context(|| format!("\"{key}\" must be a list of lists of city names"))
}

/// Load the city list and turn it into queries.
///
/// Never fails: an unreadable or malformed file is logged and yields
/// an empty query list, so the run still finishes and writes `[]`.
pub fn load_queries(path: &Path, key: &str, spot_types: &[String]) -> Vec<String> {
    let groups = fs::read_to_string(path)
        .with_context(|| format!("reading city list {}", path.display()))
        .and_then(|raw| parse_city_groups(&raw, key));

    match groups {
        Ok(groups) => {
            let queries = build_queries(&groups, spot_types);
            info!(
                "Loaded {} cities from {} -> {} queries",
                groups.iter().map(Vec::len).sum::<usize>(),
                path.display(),
                queries.len()
            );
            queries
        }
        Err(e) => {
            error!("Could not load city list: {e:#}");
            Vec::new()
        }
    }
}

/// Write the collected places as one JSON array.
///
/// Missing parent directories are created.
pub fn write_places(path: &Path, places: &[Place], pretty: bool) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let json = if pretty {
        serde_json::to_string_pretty(places)?
    } else {
        serde_json::to_string(places)?
    };

    fs::write(path, json).with_context(|| format!("writing output {}", path.display()))
}
