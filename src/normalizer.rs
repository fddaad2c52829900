// 🧹 Row Normalizer
// Reads the semicolon-delimited travel log and turns every line into a RawRow:
//   Trip;Country;Companion;Start-time;End-time
// Corrections come from the reference tables; dates from the date parser.

use crate::dates::parse_date_or_warn;
use crate::reference::{correct_country, correct_trip, expand_companion};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

// ============================================================================
// CORE TYPES
// ============================================================================

/// One line of the travel log exactly as it appears in the sheet
#[derive(Debug, Clone, Default)]
pub struct SourceRecord {
    pub trip: String,
    pub country: String,
    pub companion: String,
    pub start_time: String,
    pub end_time: String,
}

/// Column positions resolved from the header line
///
/// `Trip` and `Country` must be present; the others read as blank when the
/// sheet leaves them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    trip: usize,
    country: usize,
    companion: Option<usize>,
    start_time: Option<usize>,
    end_time: Option<usize>,
}

impl Columns {
    pub fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };

        let (Some(trip), Some(country)) = (find("Trip"), find("Country")) else {
            bail!(
                "Missing Trip/Country columns (found headers: {:?}); expected a ';'-delimited \
                 Trip;Country;Companion;Start-time;End-time table",
                headers.iter().collect::<Vec<_>>()
            );
        };

        Ok(Columns {
            trip,
            country,
            companion: find("Companion"),
            start_time: find("Start-time"),
            end_time: find("End-time"),
        })
    }

    /// Short lines yield blank cells for the missing trailing columns
    pub fn record(&self, record: &csv::StringRecord) -> SourceRecord {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .unwrap_or("")
                .to_string()
        };

        SourceRecord {
            trip: cell(Some(self.trip)),
            country: cell(Some(self.country)),
            companion: cell(self.companion),
            start_time: cell(self.start_time),
            end_time: cell(self.end_time),
        }
    }
}

/// RawRow - a normalized travel log line
///
/// Dates are the row's own cells; carry-forward happens in the trip builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub trip_name: Option<String>,
    pub country_name: String,
    pub companions: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    /// Line in the source file (1-indexed, header is line 1)
    pub line_number: usize,
}

impl RawRow {
    /// Continuation row: no trip name of its own
    pub fn is_continuation(&self) -> bool {
        self.trip_name.is_none()
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Split a companion cell on commas and expand known multi-person tokens
///
/// "Andi Danny, Micheal" → ["Andi", "Danny", "Michael"]
pub fn parse_companions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .flat_map(expand_companion)
        .collect()
}

/// Normalize one record; `None` when the country cell is blank
pub fn normalize_record(record: &SourceRecord, line_number: usize) -> Option<RawRow> {
    let country_raw = record.country.trim();
    if country_raw.is_empty() {
        debug!("Line {}: no country, row discarded", line_number);
        return None;
    }

    // Correction keys include stray whitespace, so look up before trimming
    let trip_name = correct_trip(&record.trip).trim().to_string();
    let trip_name = if trip_name.is_empty() {
        None
    } else {
        Some(trip_name)
    };

    Some(RawRow {
        trip_name,
        country_name: correct_country(country_raw),
        companions: parse_companions(&record.companion),
        start_date: parse_date_or_warn(&record.start_time),
        end_date: parse_date_or_warn(&record.end_time),
        line_number,
    })
}

/// Read and normalize a travel log from any reader
pub fn read_travel_log<R: Read>(reader: R, source_name: &str) -> Result<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .with_context(|| format!("Failed to read header line of {}", source_name))?;
    let columns = Columns::from_headers(headers)
        .with_context(|| format!("Unrecognized travel log layout in {}", source_name))?;

    let mut rows = Vec::new();

    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| {
            format!("Failed to parse line {} in {}", idx + 2, source_name)
        })?;
        let line_number = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(idx + 2);

        if let Some(row) = normalize_record(&columns.record(&record), line_number) {
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Load the travel log CSV from disk
pub fn load_travel_log(path: &Path) -> Result<Vec<RawRow>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open travel log: {}", path.display()))?;
    read_travel_log(file, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(trip: &str, country: &str, companion: &str, start: &str, end: &str) -> SourceRecord {
        SourceRecord {
            trip: trip.to_string(),
            country: country.to_string(),
            companion: companion.to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn test_companion_expansion() {
        let companions = parse_companions("Andi Danny, Micheal");
        assert_eq!(companions, vec!["Andi", "Danny", "Michael"]);
    }

    #[test]
    fn test_companions_drop_empty_segments_keep_duplicates() {
        let companions = parse_companions(" Lena, ,Lena ,");
        assert_eq!(companions, vec!["Lena", "Lena"]);
        assert!(parse_companions("").is_empty());
    }

    #[test]
    fn test_blank_country_discards_row() {
        let rec = record("Worldtrip", "   ", "Lena", "", "");
        assert!(normalize_record(&rec, 2).is_none());
    }

    #[test]
    fn test_corrections_applied() {
        let rec = record("Climbing ", "Autstria", "Micheal", "", "");
        let row = normalize_record(&rec, 2).unwrap();

        assert_eq!(row.trip_name.as_deref(), Some("Climbing"));
        assert_eq!(row.country_name, "Austria");
        assert_eq!(row.companions, vec!["Michael"]);
    }

    #[test]
    fn test_blank_trip_is_continuation() {
        let rec = record("  ", "Peru", "", "", "");
        let row = normalize_record(&rec, 3).unwrap();
        assert!(row.is_continuation());
    }

    #[test]
    fn test_dates_parsed_and_bad_dates_nulled() {
        let rec = record("Asia", "Vietnam", "", "Fist-Post", "11.Juli.2019");
        let row = normalize_record(&rec, 2).unwrap();
        assert_eq!(row.start_date, None);
        assert_eq!(row.end_date, NaiveDate::from_ymd_opt(2019, 7, 11));

        let rec = record("Asia", "Vietnam", "", "sometime", "");
        let row = normalize_record(&rec, 2).unwrap();
        assert_eq!(row.start_date, None);
    }

    #[test]
    fn test_read_semicolon_table() {
        let csv = "Trip;Country;Companion;Start-time;End-time\n\
                   Worldtrip;Singapore;Andi Danny;Fist-Post;11.07.2019\n\
                   ;Vietnam;;;\n\
                   ;;;;\n\
                   Climbing ;Autstria;Micheal;01.08.2019;15.08.2019\n";

        let rows = read_travel_log(csv.as_bytes(), "test.csv").unwrap();

        assert_eq!(rows.len(), 3, "Blank country line should be skipped");
        assert_eq!(rows[0].trip_name.as_deref(), Some("Worldtrip"));
        assert_eq!(rows[0].companions, vec!["Andi", "Danny"]);
        assert_eq!(rows[1].trip_name, None);
        assert_eq!(rows[1].line_number, 3);
        assert_eq!(rows[2].trip_name.as_deref(), Some("Climbing"));
        assert_eq!(rows[2].country_name, "Austria");
        assert_eq!(rows[2].line_number, 5);
    }

    #[test]
    fn test_short_lines_tolerated() {
        let csv = "Trip;Country;Companion;Start-time;End-time\nAsia;Nepal\n";
        let rows = read_travel_log(csv.as_bytes(), "short.csv").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].country_name, "Nepal");
        assert!(rows[0].companions.is_empty());
    }

    #[test]
    fn test_comma_delimited_export_rejected() {
        let csv = "Trip,Country,Companion,Start-time,End-time\n\
                   Worldtrip,Singapore,,,11.07.2019\n";
        let err = read_travel_log(csv.as_bytes(), "export.csv").unwrap_err();
        assert!(format!("{:#}", err).contains("Missing Trip/Country columns"));
    }

    #[test]
    fn test_foreign_headers_rejected() {
        let csv = "Reise;Land\nAsien;Nepal\n";
        assert!(read_travel_log(csv.as_bytes(), "reise.csv").is_err());
    }

    #[test]
    fn test_columns_resolved_by_name() {
        let csv = "Country;Trip;End-time\nNepal;Asia;31.01.2020\n";
        let rows = read_travel_log(csv.as_bytes(), "reordered.csv").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].trip_name.as_deref(), Some("Asia"));
        assert_eq!(rows[0].country_name, "Nepal");
        assert_eq!(rows[0].start_date, None);
        assert_eq!(rows[0].end_date, NaiveDate::from_ymd_opt(2020, 1, 31));
    }
}
