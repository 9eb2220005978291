//! Favorite toggling.
//!
//! A toggle is split into a plan ([`ToggleIntent`], computed from the flight
//! as currently displayed) and its persistence ([`FavoriteToggle::apply`]).
//! Callers that show the flip before the write lands keep the speculative
//! state themselves; see [`crate::coordinator`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{FavoriteFlight, Flight, FlightKey, NOT_FAVORITE_ID};
use crate::repository::FlightsRepository;

/// The store mutation a toggle needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleIntent {
    /// Mark the pair as a favorite.
    Add {
        /// The pair to add.
        key: FlightKey,
    },
    /// Remove the favorite. `id` may be [`NOT_FAVORITE_ID`] when the add
    /// that created it has not reported its id yet.
    Remove {
        /// Favorite row id as last known.
        id: i64,
        /// The pair to remove.
        key: FlightKey,
    },
}

impl ToggleIntent {
    /// Plan the toggle of `flight` from its displayed state.
    #[must_use]
    pub fn plan(flight: &Flight) -> Self {
        if flight.is_favorite {
            Self::Remove {
                id: flight.id,
                key: flight.key(),
            }
        } else {
            Self::Add { key: flight.key() }
        }
    }

    /// The pair being toggled.
    #[must_use]
    pub fn key(&self) -> &FlightKey {
        match self {
            Self::Add { key } | Self::Remove { key, .. } => key,
        }
    }

    /// Favorite state once this intent is applied.
    #[must_use]
    pub fn target_is_favorite(&self) -> bool {
        matches!(self, Self::Add { .. })
    }
}

/// Result of a persisted toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The favorite exists with this id.
    Added(i64),
    /// The favorite is gone (or was never stored).
    Removed,
}

impl ToggleOutcome {
    /// The flight id to display after this outcome.
    #[must_use]
    pub fn flight_id(&self) -> i64 {
        match self {
            Self::Added(id) => *id,
            Self::Removed => NOT_FAVORITE_ID,
        }
    }
}

/// Applies favorite toggles to the store.
#[derive(Clone)]
pub struct FavoriteToggle {
    repo: Arc<dyn FlightsRepository>,
}

impl std::fmt::Debug for FavoriteToggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavoriteToggle").finish_non_exhaustive()
    }
}

impl FavoriteToggle {
    /// Create a workflow over `repo`.
    #[must_use]
    pub fn new(repo: Arc<dyn FlightsRepository>) -> Self {
        Self { repo }
    }

    /// Persist `intent`.
    ///
    /// Removing a favorite whose id is still the sentinel looks the id up by
    /// pair first; if no row exists the removal is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn apply(&self, intent: &ToggleIntent) -> Result<ToggleOutcome> {
        match intent {
            ToggleIntent::Add { key } => {
                let id = self
                    .repo
                    .add_favorite(&key.departure, &key.destination)
                    .await?;
                info!("Added favorite {} (id {})", key, id);
                Ok(ToggleOutcome::Added(id))
            }
            ToggleIntent::Remove { id, key } => {
                let id = if *id == NOT_FAVORITE_ID {
                    debug!("Resolving id of {} before removal", key);
                    match self.repo.favorite_id(&key.departure, &key.destination).await? {
                        Some(id) => id,
                        None => {
                            debug!("{} is not stored, nothing to remove", key);
                            return Ok(ToggleOutcome::Removed);
                        }
                    }
                } else {
                    *id
                };
                let favorite = FavoriteFlight {
                    id,
                    departure_code: key.departure.clone(),
                    destination_code: key.destination.clone(),
                };
                if self.repo.remove_favorite(&favorite).await? {
                    info!("Removed favorite {} (id {})", key, id);
                }
                Ok(ToggleOutcome::Removed)
            }
        }
    }

    /// Toggle `flight` in place: flip it, persist, and keep the new id.
    ///
    /// On failure the flip is reverted before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn toggle(&self, flight: &mut Flight) -> Result<ToggleOutcome> {
        let intent = ToggleIntent::plan(flight);
        let previous = (flight.id, flight.is_favorite);
        flight.is_favorite = intent.target_is_favorite();

        match self.apply(&intent).await {
            Ok(outcome) => {
                flight.id = outcome.flight_id();
                Ok(outcome)
            }
            Err(err) => {
                warn!("Toggle of {} failed, reverting: {}", intent.key(), err);
                (flight.id, flight.is_favorite) = previous;
                Err(err)
            }
        }
    }
}
