//! Rendering of airports and flights for the terminal.

use serde::Serialize;

use super::OutputFormat;
use crate::model::{Airport, Flight};

/// Render airports in `format`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_airports(airports: &[Airport], format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => to_json(airports),
        OutputFormat::Plain => Ok(lines(airports.iter().map(ToString::to_string))),
        OutputFormat::Table => {
            let mut out = format!("{:<5} {:>12}  {}\n", "CODE", "PASSENGERS", "NAME");
            for airport in airports {
                out.push_str(&format!(
                    "{:<5} {:>12}  {}\n",
                    airport.iata_code, airport.passengers, airport.name
                ));
            }
            Ok(out)
        }
    }
}

/// Render flights in `format`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_flights(flights: &[Flight], format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => to_json(flights),
        OutputFormat::Plain => Ok(lines(flights.iter().map(ToString::to_string))),
        OutputFormat::Table => {
            let mut out = format!("{:<4} {:<4} {:<4} {:>6}\n", "FAV", "FROM", "TO", "ID");
            for flight in flights {
                out.push_str(&format!(
                    "{:<4} {:<4} {:<4} {:>6}\n",
                    if flight.is_favorite { "*" } else { "" },
                    flight.from.iata_code,
                    flight.to.iata_code,
                    flight.id
                ));
            }
            Ok(out)
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value).map(|mut s| {
        s.push('\n');
        s
    })
}

fn lines(items: impl Iterator<Item = String>) -> String {
    items.map(|line| line + "\n").collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn airports() -> Vec<Airport> {
        vec![
            Airport::new(2, "JFK", "John F. Kennedy International Airport", 100),
            Airport::new(1, "FCO", "Leonardo da Vinci International Airport", 23),
        ]
    }

    #[test]
    fn test_render_airports_plain() {
        let out = render_airports(&airports(), OutputFormat::Plain).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.starts_with("JFK John F. Kennedy"));
    }

    #[test]
    fn test_render_airports_table() {
        let out = render_airports(&airports(), OutputFormat::Table).unwrap();
        let mut rows = out.lines();
        assert!(rows.next().unwrap().starts_with("CODE"));
        assert!(rows.next().unwrap().contains("100"));
    }

    #[test]
    fn test_render_flights_json() {
        let mut list = airports();
        let fco = list.pop().unwrap();
        let jfk = list.pop().unwrap();
        let flights = vec![Flight::favorite(4, fco, jfk)];

        let out = render_flights(&flights, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["id"], 4);
        assert_eq!(value[0]["is_favorite"], true);
    }

    #[test]
    fn test_render_flights_table_marks_favorites() {
        let mut list = airports();
        let fco = list.pop().unwrap();
        let jfk = list.pop().unwrap();
        let flights = vec![Flight::favorite(4, fco.clone(), jfk.clone()), Flight::new(jfk, fco)];

        let out = render_flights(&flights, OutputFormat::Table).unwrap();
        let rows: Vec<_> = out.lines().collect();
        assert!(rows[1].starts_with('*'));
        assert!(!rows[2].starts_with('*'));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_flights(&[], OutputFormat::Plain).unwrap(), "");
    }
}
