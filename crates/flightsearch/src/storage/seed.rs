//! Airport seed dataset.
//!
//! The catalog ships as a JSON array compiled into the binary. A different
//! dataset in the same format can be supplied through configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::Airport;

/// The dataset bundled with the crate.
pub const BUNDLED_AIRPORTS: &str = include_str!("../../data/airports.json");

/// Where the airport catalog is seeded from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeedSource {
    /// The dataset compiled into the crate.
    #[default]
    Bundled,
    /// A JSON file on disk.
    File(PathBuf),
}

/// One entry of a seed file. `id` is optional and defaults to the 1-based
/// position in the array.
#[derive(Debug, Deserialize)]
struct SeedAirport {
    id: Option<i64>,
    iata_code: String,
    name: String,
    passengers: i64,
}

impl SeedSource {
    /// Build a source from an optional configured path.
    #[must_use]
    pub fn from_path(path: Option<&Path>) -> Self {
        path.map_or(Self::Bundled, |p| Self::File(p.to_path_buf()))
    }

    /// Human-readable origin for logs and errors.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Bundled => "bundled".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }

    /// Read and validate the dataset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SeedLoad`] if the file cannot be read, is not valid
    /// JSON, or contains malformed or duplicate IATA codes.
    pub fn load(&self) -> Result<Vec<Airport>> {
        match self {
            Self::Bundled => parse_airports(BUNDLED_AIRPORTS, &self.describe()),
            Self::File(path) => {
                let json = std::fs::read_to_string(path)
                    .map_err(|e| Error::seed_load(self.describe(), e.to_string()))?;
                parse_airports(&json, &self.describe())
            }
        }
    }
}

/// Parse a JSON seed dataset.
///
/// # Errors
///
/// Returns [`Error::SeedLoad`] on malformed input.
pub fn parse_airports(json: &str, origin: &str) -> Result<Vec<Airport>> {
    let entries: Vec<SeedAirport> =
        serde_json::from_str(json).map_err(|e| Error::seed_load(origin, e.to_string()))?;

    let mut seen = HashSet::new();
    let mut airports = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        if !is_iata_code(&entry.iata_code) {
            return Err(Error::seed_load(
                origin,
                format!("invalid IATA code {:?}", entry.iata_code),
            ));
        }
        if !seen.insert(entry.iata_code.clone()) {
            return Err(Error::seed_load(
                origin,
                format!("duplicate IATA code {}", entry.iata_code),
            ));
        }
        let id = match entry.id {
            Some(id) => id,
            None => i64::try_from(index + 1).map_err(|_| Error::seed_load(origin, "too many airports"))?,
        };
        airports.push(Airport {
            id,
            iata_code: entry.iata_code,
            name: entry.name,
            passengers: entry.passengers,
        });
    }
    Ok(airports)
}

/// Three ASCII letters or digits.
#[must_use]
pub fn is_iata_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_alphanumeric())
}
