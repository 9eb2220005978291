//! `flightsearch` - Local airport search and favorite flights
//!
//! This library provides an airport catalog and a favorites store backed by
//! `SQLite`, live queries that follow store changes, and the view state of a
//! search screen with optimistic favorite toggling.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod live;
pub mod logging;
pub mod model;
pub mod query;
pub mod repository;
pub mod storage;
pub mod toggle;

pub use config::Config;
pub use coordinator::{Mode, ToggleEvent, ToggleTicket, ViewStateCoordinator};
pub use error::{Error, ResolutionError, Result};
pub use live::{Live, LiveState, Snapshot};
pub use logging::init_logging;
pub use model::{Airport, FavoriteFlight, Flight, FlightKey, NOT_FAVORITE_ID};
pub use query::FlightQueryService;
pub use repository::{FlightsRepository, SqliteRepository, Table, TableVersions};
pub use storage::{DuplicatePolicy, SchemaStatus, SeedSource, Storage, StorageStats};
pub use toggle::{FavoriteToggle, ToggleIntent, ToggleOutcome};
