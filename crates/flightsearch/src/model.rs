//! Core data types for flightsearch.
//!
//! Airports and favorites mirror rows of the `airport` and `favorite`
//! tables. A [`Flight`] is derived at query time from an airport pair and
//! an optional favorite match; it is never persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel flight id meaning "not favorited".
pub const NOT_FAVORITE_ID: i64 = 0;

/// An airport from the bundled catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Airport {
    /// Surrogate key assigned at seed time.
    pub id: i64,
    /// Three-letter IATA code, unique across the catalog.
    pub iata_code: String,
    /// Display name.
    pub name: String,
    /// Yearly traffic volume, used for default ordering.
    pub passengers: i64,
}

impl Airport {
    /// Create a new airport record.
    #[must_use]
    pub fn new(id: i64, iata_code: impl Into<String>, name: impl Into<String>, passengers: i64) -> Self {
        Self {
            id,
            iata_code: iata_code.into(),
            name: name.into(),
            passengers,
        }
    }
}

impl fmt::Display for Airport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.iata_code, self.name)
    }
}

/// A persisted favorite route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteFlight {
    /// Surrogate key assigned on insert.
    pub id: i64,
    /// IATA code of the departure airport.
    pub departure_code: String,
    /// IATA code of the destination airport.
    pub destination_code: String,
}

impl FavoriteFlight {
    /// The ordered pair this favorite marks.
    #[must_use]
    pub fn key(&self) -> FlightKey {
        FlightKey::new(&self.departure_code, &self.destination_code)
    }
}

/// Ordered (departure, destination) pair identifying a flight across views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey {
    /// Departure IATA code.
    pub departure: String,
    /// Destination IATA code.
    pub destination: String,
}

impl FlightKey {
    /// Create a key for the given pair of IATA codes.
    #[must_use]
    pub fn new(departure: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            departure: departure.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.departure, self.destination)
    }
}

/// A candidate flight between two airports, with its favorite status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    /// Favorite row id, or [`NOT_FAVORITE_ID`] when not favorited.
    pub id: i64,
    /// Departure airport.
    pub from: Airport,
    /// Destination airport.
    pub to: Airport,
    /// Whether a favorite exists for this pair.
    pub is_favorite: bool,
}

impl Flight {
    /// A flight that is not (yet) a favorite.
    #[must_use]
    pub fn new(from: Airport, to: Airport) -> Self {
        Self {
            id: NOT_FAVORITE_ID,
            from,
            to,
            is_favorite: false,
        }
    }

    /// A flight backed by the favorite row `id`.
    #[must_use]
    pub fn favorite(id: i64, from: Airport, to: Airport) -> Self {
        Self {
            id,
            from,
            to,
            is_favorite: true,
        }
    }

    /// The ordered pair of IATA codes for this flight.
    #[must_use]
    pub fn key(&self) -> FlightKey {
        FlightKey::new(&self.from.iata_code, &self.to.iata_code)
    }

    /// Convert into the favorite row this flight corresponds to.
    #[must_use]
    pub fn to_favorite(&self) -> FavoriteFlight {
        FavoriteFlight {
            id: self.id,
            departure_code: self.from.iata_code.clone(),
            destination_code: self.to.iata_code.clone(),
        }
    }
}

impl fmt::Display for Flight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let star = if self.is_favorite { '*' } else { ' ' };
        write!(f, "[{star}] {} -> {}", self.from, self.to)
    }
}
