//! Flight queries composed from the catalog and favorites.
//!
//! Each query comes in a one-shot form (`resolve_*`, `*_once`) returning a
//! [`Snapshot`], and a live form returning a [`Live`] stream that re-runs
//! when the tables it reads change.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ResolutionError, Result};
use crate::live::{Live, Snapshot};
use crate::model::{Airport, FavoriteFlight, Flight, NOT_FAVORITE_ID};
use crate::repository::{FlightsRepository, Table, TableVersions};

const AIRPORTS: &[Table] = &[Table::Airports];
const AIRPORTS_AND_FAVORITES: &[Table] = &[Table::Airports, Table::Favorites];

/// Builds flight lists for presentation.
#[derive(Clone)]
pub struct FlightQueryService {
    repo: Arc<dyn FlightsRepository>,
}

impl std::fmt::Debug for FlightQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightQueryService").finish_non_exhaustive()
    }
}

impl FlightQueryService {
    /// Create a service over `repo`.
    #[must_use]
    pub fn new(repo: Arc<dyn FlightsRepository>) -> Self {
        Self { repo }
    }

    /// The underlying repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn FlightsRepository> {
        &self.repo
    }

    // === One-shot queries ===

    /// Every favorite as a [`Flight`] with `is_favorite = true`.
    ///
    /// Favorites whose endpoints are missing from the catalog are skipped and
    /// listed in [`Snapshot::unresolved`].
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn resolve_favorites(&self, versions: TableVersions) -> Result<Snapshot<Flight>> {
        let favorites = self.repo.all_favorites().await?;
        let mut snapshot = Snapshot::new(Vec::with_capacity(favorites.len()), versions);

        for favorite in favorites {
            match self.resolve_favorite(&favorite).await? {
                Ok(flight) => snapshot.items.push(flight),
                Err(unresolved) => {
                    warn!("Skipping favorite: {}", unresolved);
                    snapshot.unresolved.push(unresolved);
                }
            }
        }
        Ok(snapshot)
    }

    /// Every airport other than `origin`, paired with its favorite status.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn resolve_flights_from(
        &self,
        origin: &Airport,
        versions: TableVersions,
    ) -> Result<Snapshot<Flight>> {
        let destinations = self.repo.other_airports(&origin.iata_code).await?;
        let mut flights = Vec::with_capacity(destinations.len());

        for destination in destinations {
            let favorite = self
                .repo
                .favorite_id(&origin.iata_code, &destination.iata_code)
                .await?;
            flights.push(Flight {
                id: favorite.unwrap_or(NOT_FAVORITE_ID),
                from: origin.clone(),
                to: destination,
                is_favorite: favorite.is_some(),
            });
        }
        debug!("{} flights from {}", flights.len(), origin.iata_code);
        Ok(Snapshot::new(flights, versions))
    }

    /// Catalog search; an empty term returns nothing without querying.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn search_airports_once(&self, term: &str) -> Result<Vec<Airport>> {
        if term.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.search_airports(term).await
    }

    async fn resolve_favorite(
        &self,
        favorite: &FavoriteFlight,
    ) -> Result<std::result::Result<Flight, ResolutionError>> {
        let Some(from) = self.repo.airport_by_iata(&favorite.departure_code).await? else {
            return Ok(Err(unresolved(favorite, &favorite.departure_code)));
        };
        let Some(to) = self.repo.airport_by_iata(&favorite.destination_code).await? else {
            return Ok(Err(unresolved(favorite, &favorite.destination_code)));
        };
        Ok(Ok(Flight::favorite(favorite.id, from, to)))
    }

    // === Live queries ===

    /// All airports, busiest first.
    #[must_use]
    pub fn all_airports(&self) -> Live<Airport> {
        let repo = Arc::clone(&self.repo);
        Live::spawn("all_airports", self.repo.changes(), AIRPORTS, move |versions| {
            let repo = Arc::clone(&repo);
            async move {
                repo.all_airports()
                    .await
                    .map(|items| Snapshot::new(items, versions))
            }
        })
    }

    /// Airports matching `term`. An empty term yields a fixed empty stream.
    #[must_use]
    pub fn search_airports(&self, term: &str) -> Live<Airport> {
        if term.is_empty() {
            return Live::fixed(Vec::new());
        }
        let repo = Arc::clone(&self.repo);
        let term: Arc<str> = Arc::from(term);
        Live::spawn("search_airports", self.repo.changes(), AIRPORTS, move |versions| {
            let repo = Arc::clone(&repo);
            let term = Arc::clone(&term);
            async move {
                repo.search_airports(&term)
                    .await
                    .map(|items| Snapshot::new(items, versions))
            }
        })
    }

    /// Every airport except `iata_code`, busiest first.
    #[must_use]
    pub fn airports_excluding(&self, iata_code: &str) -> Live<Airport> {
        let repo = Arc::clone(&self.repo);
        let code: Arc<str> = Arc::from(iata_code);
        Live::spawn("airports_excluding", self.repo.changes(), AIRPORTS, move |versions| {
            let repo = Arc::clone(&repo);
            let code = Arc::clone(&code);
            async move {
                repo.other_airports(&code)
                    .await
                    .map(|items| Snapshot::new(items, versions))
            }
        })
    }

    /// All favorites as flights, re-derived whenever favorites change.
    #[must_use]
    pub fn all_favorite_flights(&self) -> Live<Flight> {
        let service = self.clone();
        Live::spawn(
            "all_favorite_flights",
            self.repo.changes(),
            AIRPORTS_AND_FAVORITES,
            move |versions| {
                let service = service.clone();
                async move { service.resolve_favorites(versions).await }
            },
        )
    }

    /// Flights from `origin`, re-derived whenever favorites change.
    #[must_use]
    pub fn flights_from(&self, origin: &Airport) -> Live<Flight> {
        let service = self.clone();
        let origin = Arc::new(origin.clone());
        Live::spawn(
            "flights_from",
            self.repo.changes(),
            AIRPORTS_AND_FAVORITES,
            move |versions| {
                let service = service.clone();
                let origin = Arc::clone(&origin);
                async move { service.resolve_flights_from(&origin, versions).await }
            },
        )
    }
}

fn unresolved(favorite: &FavoriteFlight, code: &str) -> ResolutionError {
    ResolutionError {
        favorite_id: favorite.id,
        missing_code: code.to_string(),
    }
}
