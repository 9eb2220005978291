//! Command-line interface for flightsearch.
//!
//! This module provides the CLI structure for the `flightsearch` binary.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AirportsCommand, ConfigCommand, FavoritesCommand, FromCommand, OutputFormat, SearchCommand,
    StatusCommand, ToggleCommand,
};

/// flightsearch - Find flights between airports and keep favorites
///
/// Searches a local airport catalog, lists every flight from an origin and
/// stores favorite routes in a `SQLite` database.
#[derive(Debug, Parser)]
#[command(name = "flightsearch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List airports, busiest first
    Airports(AirportsCommand),

    /// Search airports by code or name
    Search(SearchCommand),

    /// List flights from an origin airport
    From(FromCommand),

    /// List favorite flights
    Favorites(FavoritesCommand),

    /// Add or remove a favorite flight
    Toggle(ToggleCommand),

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
