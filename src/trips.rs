// 🗺️ Trip Builder
// Single ordered pass over normalized rows.
//
// Carry-forward rules:
// - A row with a trip name (re)starts that trip: name, start and end all come
//   from the row itself, overwriting whatever was carried.
// - A blank trip name continues the carried trip; a non-null end moves the
//   carried end forward, start is never touched.
//
// Rows are grouped by effective trip name in first-seen order. A country that
// already appears in the trip is dropped and reported.

use crate::normalizer::RawRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

// ============================================================================
// TRIP + COUNTRY VISIT
// ============================================================================

/// One country visited during a trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryVisit {
    pub country_name: String,

    /// Companions as listed on the source row (unsorted, may repeat)
    pub companions: Vec<String>,

    /// 1-based, first-seen order within the trip
    pub visit_order: u32,
}

/// A named journey with its ordered country visits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub countries: Vec<CountryVisit>,
}

impl Trip {
    pub fn new(name: String, start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Trip {
            name,
            start_date,
            end_date,
            countries: Vec::new(),
        }
    }

    pub fn has_country(&self, country_name: &str) -> bool {
        self.countries.iter().any(|c| c.country_name == country_name)
    }

    /// Union of all visit companions, sorted (the persisted representation)
    pub fn companions(&self) -> Vec<String> {
        self.countries
            .iter()
            .flat_map(|c| c.companions.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Country names in visit order
    pub fn country_names(&self) -> Vec<&str> {
        self.countries.iter().map(|c| c.country_name.as_str()).collect()
    }

    /// "2019-07-11" or "—" for each side of the range
    pub fn date_range_label(&self) -> String {
        let fmt = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "—".to_string());
        format!("[{} → {}]", fmt(self.start_date), fmt(self.end_date))
    }
}

// ============================================================================
// CARRY-FORWARD STATE
// ============================================================================

/// Accumulator threaded through the row sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarryState {
    pub trip_name: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// A row with its effective (carried) trip name and dates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRow {
    pub trip_name: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub country_name: String,
    pub companions: Vec<String>,
    pub line_number: usize,
}

impl CarryState {
    /// Pure transition: consume one row, return the next state and the row
    /// resolved against it. `None` if no trip has been named yet.
    pub fn advance(self, row: &RawRow) -> (CarryState, Option<ResolvedRow>) {
        let next = match &row.trip_name {
            Some(name) => CarryState {
                trip_name: Some(name.clone()),
                start: row.start_date,
                end: row.end_date,
            },
            None => CarryState {
                end: row.end_date.or(self.end),
                ..self
            },
        };

        let resolved = next.trip_name.as_ref().map(|name| ResolvedRow {
            trip_name: name.clone(),
            start: next.start,
            end: next.end,
            country_name: row.country_name.clone(),
            companions: row.companions.clone(),
            line_number: row.line_number,
        });

        (next, resolved)
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// A country row dropped because the trip already lists that country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateVisit {
    pub trip_name: String,
    pub country_name: String,
    pub line_number: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TripBuildReport {
    pub trips: Vec<Trip>,
    pub duplicates: Vec<DuplicateVisit>,

    /// Lines that appeared before any trip was named
    pub orphan_lines: Vec<usize>,
}

impl TripBuildReport {
    /// Distinct country names across all trips, sorted
    pub fn country_names(&self) -> Vec<String> {
        self.trips
            .iter()
            .flat_map(|t| t.countries.iter().map(|c| c.country_name.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct TripBuilder {
    state: CarryState,
    trips: Vec<Trip>,
    index: HashMap<String, usize>,
    duplicates: Vec<DuplicateVisit>,
    orphan_lines: Vec<usize>,
}

impl TripBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: &RawRow) {
        let (next, resolved) = std::mem::take(&mut self.state).advance(row);
        self.state = next;

        let Some(resolved) = resolved else {
            warn!(
                "Line {}: '{}' appears before any trip name, row skipped",
                row.line_number, row.country_name
            );
            self.orphan_lines.push(row.line_number);
            return;
        };

        let idx = match self.index.get(&resolved.trip_name) {
            Some(&idx) => {
                // Existing trip: start stays, end is last-non-null-wins
                if resolved.end.is_some() {
                    self.trips[idx].end_date = resolved.end;
                }
                idx
            }
            None => {
                self.trips.push(Trip::new(
                    resolved.trip_name.clone(),
                    resolved.start,
                    resolved.end,
                ));
                let idx = self.trips.len() - 1;
                self.index.insert(resolved.trip_name.clone(), idx);
                idx
            }
        };

        let trip = &mut self.trips[idx];

        if trip.has_country(&resolved.country_name) {
            info!(
                "ℹ️  Duplicate skipped: {} in '{}' (line {})",
                resolved.country_name, trip.name, resolved.line_number
            );
            self.duplicates.push(DuplicateVisit {
                trip_name: trip.name.clone(),
                country_name: resolved.country_name,
                line_number: resolved.line_number,
            });
            return;
        }

        let visit_order = trip.countries.len() as u32 + 1;
        trip.countries.push(CountryVisit {
            country_name: resolved.country_name,
            companions: resolved.companions,
            visit_order,
        });
    }

    pub fn finish(self) -> TripBuildReport {
        TripBuildReport {
            trips: self.trips,
            duplicates: self.duplicates,
            orphan_lines: self.orphan_lines,
        }
    }
}

/// Build trips from an ordered row sequence, keeping the report
pub fn build_trip_report(rows: &[RawRow]) -> TripBuildReport {
    let mut builder = TripBuilder::new();
    for row in rows {
        builder.push(row);
    }
    builder.finish()
}

/// Build trips from an ordered row sequence
pub fn build_trips(rows: &[RawRow]) -> Vec<Trip> {
    build_trip_report(rows).trips
}
