//! Async repository over the airport catalog and favorites store.
//!
//! [`FlightsRepository`] is the seam the query service, toggle workflow and
//! view-state coordinator are written against. [`SqliteRepository`] is the
//! production implementation: it runs every call on the blocking pool behind
//! a mutex and publishes a [`TableVersions`] change feed so live queries know
//! when to re-run.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::model::{Airport, FavoriteFlight};
use crate::storage::{DuplicatePolicy, Storage, StorageStats};

/// A table whose changes can be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// The airport catalog.
    Airports,
    /// The favorites table.
    Favorites,
}

/// Per-table change counters published on the change feed.
///
/// Each counter increases by one after every committed mutation of its table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableVersions {
    /// Version of the airport table.
    pub airports: u64,
    /// Version of the favorites table.
    pub favorites: u64,
}

impl TableVersions {
    /// The counter for `table`.
    #[must_use]
    pub fn of(&self, table: Table) -> u64 {
        match table {
            Table::Airports => self.airports,
            Table::Favorites => self.favorites,
        }
    }

    /// Whether any of `tables` moved between `self` and `newer`.
    #[must_use]
    pub fn changed_since(&self, newer: &Self, tables: &[Table]) -> bool {
        tables.iter().any(|t| self.of(*t) != newer.of(*t))
    }

    fn bump(&mut self, table: Table) {
        match table {
            Table::Airports => self.airports += 1,
            Table::Favorites => self.favorites += 1,
        }
    }
}

/// Data access for airports and favorites.
///
/// Reads are one-shot; use [`crate::query::FlightQueryService`] for live
/// variants that re-run when [`FlightsRepository::changes`] moves.
#[async_trait::async_trait]
pub trait FlightsRepository: Send + Sync {
    /// All airports, busiest first.
    async fn all_airports(&self) -> Result<Vec<Airport>>;

    /// Airports matching `term` by code prefix or name substring; empty for an empty term.
    async fn search_airports(&self, term: &str) -> Result<Vec<Airport>>;

    /// Every airport except `iata_code`, busiest first.
    async fn other_airports(&self, iata_code: &str) -> Result<Vec<Airport>>;

    /// One airport by IATA code.
    async fn airport_by_iata(&self, iata_code: &str) -> Result<Option<Airport>>;

    /// All stored favorites.
    async fn all_favorites(&self) -> Result<Vec<FavoriteFlight>>;

    /// Id of the favorite for the exact ordered pair.
    async fn favorite_id(&self, departure: &str, destination: &str) -> Result<Option<i64>>;

    /// Store a favorite and return its id.
    async fn add_favorite(&self, departure: &str, destination: &str) -> Result<i64>;

    /// Remove the favorite row with `favorite.id`. Returns whether a row was removed.
    async fn remove_favorite(&self, favorite: &FavoriteFlight) -> Result<bool>;

    /// Subscribe to the table change feed.
    fn changes(&self) -> watch::Receiver<TableVersions>;
}

/// [`FlightsRepository`] backed by a [`Storage`] database.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    storage: Arc<Mutex<Storage>>,
    policy: DuplicatePolicy,
    versions: Arc<watch::Sender<TableVersions>>,
}

impl SqliteRepository {
    /// Wrap an opened (and seeded) storage.
    #[must_use]
    pub fn new(storage: Storage, policy: DuplicatePolicy) -> Self {
        let (versions, _) = watch::channel(TableVersions::default());
        Self {
            storage: Arc::new(Mutex::new(storage)),
            policy,
            versions: Arc::new(versions),
        }
    }

    /// The duplicate-favorite policy in effect.
    #[must_use]
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is unavailable or the query fails.
    pub async fn stats(&self) -> Result<StorageStats> {
        self.with_storage(|s| s.stats()).await
    }

    /// Run `f` against the storage on the blocking pool.
    async fn with_storage<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || {
            let guard = storage
                .lock()
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            f(&guard)
        })
        .await?
    }

    fn touch(&self, table: Table) {
        self.versions.send_modify(|v| v.bump(table));
    }
}

#[async_trait::async_trait]
impl FlightsRepository for SqliteRepository {
    async fn all_airports(&self) -> Result<Vec<Airport>> {
        self.with_storage(Storage::all_airports).await
    }

    async fn search_airports(&self, term: &str) -> Result<Vec<Airport>> {
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let term = term.to_string();
        self.with_storage(move |s| s.search_airports(&term)).await
    }

    async fn other_airports(&self, iata_code: &str) -> Result<Vec<Airport>> {
        let code = iata_code.to_string();
        self.with_storage(move |s| s.other_airports(&code)).await
    }

    async fn airport_by_iata(&self, iata_code: &str) -> Result<Option<Airport>> {
        let code = iata_code.to_string();
        self.with_storage(move |s| s.airport_by_iata(&code)).await
    }

    async fn all_favorites(&self) -> Result<Vec<FavoriteFlight>> {
        self.with_storage(Storage::all_favorites).await
    }

    async fn favorite_id(&self, departure: &str, destination: &str) -> Result<Option<i64>> {
        let (from, to) = (departure.to_string(), destination.to_string());
        self.with_storage(move |s| s.favorite_id(&from, &to)).await
    }

    #[instrument(skip(self))]
    async fn add_favorite(&self, departure: &str, destination: &str) -> Result<i64> {
        let (from, to) = (departure.to_string(), destination.to_string());
        let policy = self.policy;
        let id = self
            .with_storage(move |s| s.insert_favorite(&from, &to, policy))
            .await?;
        self.touch(Table::Favorites);
        Ok(id)
    }

    #[instrument(skip(self), fields(id = favorite.id))]
    async fn remove_favorite(&self, favorite: &FavoriteFlight) -> Result<bool> {
        let id = favorite.id;
        let removed = self.with_storage(move |s| s.delete_favorite(id)).await?;
        if removed {
            self.touch(Table::Favorites);
        } else {
            debug!("No favorite with id {} to remove", id);
        }
        Ok(removed)
    }

    fn changes(&self) -> watch::Receiver<TableVersions> {
        self.versions.subscribe()
    }
}
