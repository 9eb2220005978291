//! `SQLite` schema definitions for flightsearch.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the airport catalog table.
pub const CREATE_AIRPORT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS airport (
    id INTEGER PRIMARY KEY,
    iata_code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    passengers INTEGER NOT NULL
)
";

/// SQL statement to create an index on passengers for the default ordering.
pub const CREATE_PASSENGERS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_airport_passengers ON airport(passengers DESC)
";

/// SQL statement to create the favorites table.
pub const CREATE_FAVORITE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS favorite (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    departure_code TEXT NOT NULL,
    destination_code TEXT NOT NULL
)
";

/// One favorite per ordered (departure, destination) pair.
pub const CREATE_FAVORITE_PAIR_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_favorite_pair ON favorite(departure_code, destination_code)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Drops every data table; used when the stored schema version is unusable.
pub const DROP_DATA_TABLES: &str = r"
DROP TABLE IF EXISTS favorite;
DROP TABLE IF EXISTS airport;
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_METADATA_TABLE,
    CREATE_AIRPORT_TABLE,
    CREATE_PASSENGERS_INDEX,
    CREATE_FAVORITE_TABLE,
    CREATE_FAVORITE_PAIR_INDEX,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_create_airport_table_contains_required_columns() {
        assert!(CREATE_AIRPORT_TABLE.contains("id INTEGER PRIMARY KEY"));
        assert!(CREATE_AIRPORT_TABLE.contains("iata_code TEXT NOT NULL UNIQUE"));
        assert!(CREATE_AIRPORT_TABLE.contains("name TEXT NOT NULL"));
        assert!(CREATE_AIRPORT_TABLE.contains("passengers INTEGER NOT NULL"));
    }

    #[test]
    fn test_create_favorite_table_structure() {
        assert!(CREATE_FAVORITE_TABLE.contains("departure_code TEXT NOT NULL"));
        assert!(CREATE_FAVORITE_TABLE.contains("destination_code TEXT NOT NULL"));
        assert!(CREATE_FAVORITE_PAIR_INDEX.contains("UNIQUE"));
    }

    #[test]
    fn test_metadata_created_first() {
        assert_eq!(SCHEMA_STATEMENTS[0], CREATE_METADATA_TABLE);
    }
}
