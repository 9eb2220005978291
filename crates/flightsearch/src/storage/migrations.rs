//! Database schema versioning for flightsearch.
//!
//! There is exactly one supported schema. A database stamped with any other
//! version is destroyed and recreated: favorites are lost and the airport
//! catalog is reseeded by the caller.

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::schema::{CREATE_METADATA_TABLE, DROP_DATA_TABLES, SCHEMA_STATEMENTS};

/// The current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// What [`initialize_schema`] had to do to bring the database up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    /// The database had no version stamp; tables were created.
    Created,
    /// The database was already at [`CURRENT_VERSION`].
    Current,
    /// The database was at another version and has been wiped.
    Recreated {
        /// The version found before wiping.
        from_version: i32,
    },
}

/// Initialize the database schema.
///
/// # Errors
///
/// Returns an error if schema creation fails or the stored version is unreadable.
pub fn initialize_schema(conn: &Connection) -> Result<SchemaStatus> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let version = get_schema_version(conn)?;
    let status = match version {
        0 => SchemaStatus::Created,
        CURRENT_VERSION => SchemaStatus::Current,
        other => {
            warn!(
                "Schema version {} does not match {}, recreating database",
                other, CURRENT_VERSION
            );
            conn.execute_batch(DROP_DATA_TABLES)?;
            SchemaStatus::Recreated {
                from_version: other,
            }
        }
    };

    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    if status != SchemaStatus::Current {
        set_schema_version(conn, CURRENT_VERSION)?;
    }

    debug!("Schema initialized: {:?}", status);
    Ok(status)
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh database).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Set the schema version in the database.
pub(crate) fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().expect("failed to create in-memory database")
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_initialize_schema_creates_tables() {
        let conn = create_test_db();
        let status = initialize_schema(&conn).expect("failed to initialize schema");

        assert_eq!(status, SchemaStatus::Created);
        assert!(table_exists(&conn, "airport"));
        assert!(table_exists(&conn, "favorite"));
        assert!(table_exists(&conn, "metadata"));
    }

    #[test]
    fn test_initialize_schema_sets_version() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_initialize_schema_idempotent() {
        let conn = create_test_db();

        initialize_schema(&conn).expect("first init failed");
        let status = initialize_schema(&conn).expect("second init failed");

        assert_eq!(status, SchemaStatus::Current);
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_version_mismatch_recreates_tables() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO favorite (departure_code, destination_code) VALUES ('FCO', 'JFK')",
            [],
        )
        .unwrap();
        set_schema_version(&conn, 7).unwrap();

        let status = initialize_schema(&conn).unwrap();
        assert_eq!(status, SchemaStatus::Recreated { from_version: 7 });

        let favorites: i64 = conn
            .query_row("SELECT COUNT(*) FROM favorite", [], |row| row.get(0))
            .unwrap();
        assert_eq!(favorites, 0);
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_get_schema_version_fresh_db() {
        let conn = create_test_db();
        conn.execute(CREATE_METADATA_TABLE, []).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_invalid_schema_version() {
        let conn = create_test_db();
        conn.execute(CREATE_METADATA_TABLE, []).unwrap();
        conn.execute(
            "INSERT INTO metadata (key, value) VALUES ('schema_version', 'banana')",
            [],
        )
        .unwrap();

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("invalid schema version"));
    }

    #[test]
    fn test_indexes_created() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect();

        assert!(indexes.iter().any(|n| n.contains("passengers")));
        assert!(indexes.iter().any(|n| n.contains("favorite_pair")));
    }
}
