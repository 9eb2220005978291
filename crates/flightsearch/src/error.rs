//! Error types for flightsearch.
//!
//! This module defines all error types used throughout the flightsearch crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for flightsearch operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The storage worker is gone or its lock was poisoned.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    // === Seed Errors ===
    /// The airport seed dataset could not be read or parsed.
    #[error("failed to load airport seed from {origin}: {message}")]
    SeedLoad {
        /// Where the dataset came from (a path or "bundled").
        origin: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Lookup and Favorites Errors ===
    /// No airport with the given IATA code exists in the catalog.
    #[error("unknown airport: {code}")]
    UnknownAirport {
        /// The IATA code that was looked up.
        code: String,
    },

    /// A favorite for this pair already exists and duplicates are rejected.
    #[error("favorite {departure} -> {destination} already exists")]
    DuplicateFavorite {
        /// Departure IATA code.
        departure: String,
        /// Destination IATA code.
        destination: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A favorite could not be turned into a flight because one of its
/// endpoints is not in the airport catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("favorite {favorite_id} references unknown airport {missing_code}")]
pub struct ResolutionError {
    /// Row id of the favorite that failed to resolve.
    pub favorite_id: i64,
    /// The IATA code with no matching airport.
    pub missing_code: String,
}

/// A specialized Result type for flightsearch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an unknown airport error.
    #[must_use]
    pub fn unknown_airport(code: impl Into<String>) -> Self {
        Self::UnknownAirport { code: code.into() }
    }

    /// Create a duplicate favorite error.
    #[must_use]
    pub fn duplicate_favorite(departure: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::DuplicateFavorite {
            departure: departure.into(),
            destination: destination.into(),
        }
    }

    /// Create a seed load error.
    #[must_use]
    pub fn seed_load(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SeedLoad {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Check if this error means a lookup found nothing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownAirport { .. })
    }

    /// Check if this error is a rejected duplicate favorite.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateFavorite { .. })
    }
}
