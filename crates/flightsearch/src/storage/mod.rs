//! Storage layer for flightsearch.
//!
//! This module provides `SQLite`-based persistent storage for the airport
//! catalog and the favorites table, including seeding and search.

pub mod migrations;
pub mod schema;
pub mod seed;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{Airport, FavoriteFlight};

pub use migrations::SchemaStatus;
pub use seed::SeedSource;

const AIRPORT_COLUMNS: &str = "id, iata_code, name, passengers";

/// What to do when a favorite is added for a pair that already has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the existing row and return its id.
    #[default]
    Reuse,
    /// Fail with [`Error::DuplicateFavorite`].
    Reject,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Reuse => "reuse",
            Self::Reject => "reject",
        })
    }
}

/// Storage engine for airports and favorites.
///
/// The airport table is written only while seeding. Favorites are keyed by
/// a unique (departure, destination) pair.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Result of schema initialization when the database was opened.
    schema_status: SchemaStatus,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database, and recreates it if
    /// the stored schema version differs.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let schema_status = migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn,
            schema_status,
        })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        let schema_status = migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
            schema_status,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// What schema initialization did when this database was opened.
    #[must_use]
    pub fn schema_status(&self) -> SchemaStatus {
        self.schema_status
    }

    // === Seeding ===

    /// Populate the airport table from `source` if it is empty.
    ///
    /// Returns the number of airports inserted (0 when already seeded).
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset cannot be loaded or inserted.
    pub fn seed_if_empty(&mut self, source: &SeedSource) -> Result<usize> {
        if self.airport_count()? > 0 {
            debug!("Airport catalog already seeded");
            return Ok(0);
        }
        let airports = source.load()?;
        let inserted = self.insert_airports(&airports)?;
        info!(
            "Seeded {} airports from {} dataset",
            inserted,
            source.describe()
        );
        Ok(inserted)
    }

    /// Insert a batch of airports in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case.
    pub fn insert_airports(&mut self, airports: &[Airport]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO airport (id, iata_code, name, passengers) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for airport in airports {
                stmt.execute(params![
                    airport.id,
                    airport.iata_code,
                    airport.name,
                    airport.passengers
                ])?;
            }
        }
        tx.commit()?;
        Ok(airports.len())
    }

    // === Airport catalog ===

    /// All airports, busiest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all_airports(&self) -> Result<Vec<Airport>> {
        self.query_airports(
            &format!("SELECT {AIRPORT_COLUMNS} FROM airport ORDER BY passengers DESC"),
            [],
        )
    }

    /// Airports whose IATA code starts with `term` or whose name contains it.
    ///
    /// Matching uses `SQLite` `LIKE`, so it is case-insensitive for ASCII.
    /// Wildcards in `term` are matched literally. An empty term matches
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search_airports(&self, term: &str) -> Result<Vec<Airport>> {
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let escaped = escape_like(term);
        self.query_airports(
            &format!(
                r"
                SELECT {AIRPORT_COLUMNS} FROM airport
                WHERE iata_code LIKE ?1 || '%' ESCAPE '\'
                OR name LIKE '%' || ?1 || '%' ESCAPE '\'
                ORDER BY passengers DESC
                "
            ),
            [escaped],
        )
    }

    /// Every airport except `iata_code`, busiest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn other_airports(&self, iata_code: &str) -> Result<Vec<Airport>> {
        self.query_airports(
            &format!(
                r"
                SELECT {AIRPORT_COLUMNS} FROM airport
                WHERE iata_code != ?1
                ORDER BY passengers DESC
                "
            ),
            [iata_code],
        )
    }

    /// Look up one airport by IATA code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn airport_by_iata(&self, iata_code: &str) -> Result<Option<Airport>> {
        let airport = self
            .conn
            .query_row(
                &format!("SELECT {AIRPORT_COLUMNS} FROM airport WHERE iata_code = ?1"),
                [iata_code],
                Self::row_to_airport,
            )
            .optional()?;
        Ok(airport)
    }

    /// Number of airports in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn airport_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM airport", [], |row| row.get(0))?;
        Ok(count)
    }

    // === Favorites ===

    /// All favorites in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all_favorites(&self) -> Result<Vec<FavoriteFlight>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, departure_code, destination_code FROM favorite ORDER BY id ASC",
        )?;
        let favorites = stmt
            .query_map([], Self::row_to_favorite)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(favorites)
    }

    /// Id of the favorite for the exact ordered pair, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn favorite_id(&self, departure: &str, destination: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                r"
                SELECT id FROM favorite
                WHERE departure_code = ?1 AND destination_code = ?2
                ",
                [departure, destination],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Insert a favorite and return its id.
    ///
    /// When the pair already exists, `policy` decides between returning the
    /// existing id and failing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateFavorite`] under [`DuplicatePolicy::Reject`],
    /// or an error if the database operation fails.
    pub fn insert_favorite(
        &self,
        departure: &str,
        destination: &str,
        policy: DuplicatePolicy,
    ) -> Result<i64> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO favorite (departure_code, destination_code) VALUES (?1, ?2)",
            [departure, destination],
        )?;

        if inserted > 0 {
            let id = self.conn.last_insert_rowid();
            debug!("Inserted favorite {} -> {} with id {}", departure, destination, id);
            return Ok(id);
        }

        match policy {
            DuplicatePolicy::Reject => Err(Error::duplicate_favorite(departure, destination)),
            DuplicatePolicy::Reuse => {
                debug!("Favorite {} -> {} already present", departure, destination);
                self.favorite_id(departure, destination)?.ok_or_else(|| {
                    Error::internal(format!(
                        "favorite {departure} -> {destination} ignored on insert but not found"
                    ))
                })
            }
        }
    }

    /// Delete a favorite by id.
    ///
    /// Returns `true` if a row was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_favorite(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM favorite WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Number of favorites stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn favorite_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM favorite", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            airports: self.airport_count()?,
            favorites: self.favorite_count()?,
            db_size_bytes,
        })
    }

    fn query_airports<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Airport>> {
        let mut stmt = self.conn.prepare(sql)?;
        let airports = stmt
            .query_map(params, Self::row_to_airport)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(airports)
    }

    fn row_to_airport(row: &rusqlite::Row) -> rusqlite::Result<Airport> {
        Ok(Airport {
            id: row.get(0)?,
            iata_code: row.get(1)?,
            name: row.get(2)?,
            passengers: row.get(3)?,
        })
    }

    fn row_to_favorite(row: &rusqlite::Row) -> rusqlite::Result<FavoriteFlight> {
        Ok(FavoriteFlight {
            id: row.get(0)?,
            departure_code: row.get(1)?,
            destination_code: row.get(2)?,
        })
    }
}

/// Escape `LIKE` wildcards so `term` matches literally (escape char `\`).
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of airports in the catalog.
    pub airports: i64,
    /// Number of stored favorites.
    pub favorites: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
