// ⚠️ Error taxonomy
// Only configuration errors are fatal. Everything else is recorded per record
// and the run keeps going.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A date cell that matched neither supported format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    #[error("unrecognized date format: '{0}'")]
    Unrecognized(String),

    #[error("unknown month name '{month}' in '{raw}'")]
    UnknownMonth { raw: String, month: String },

    #[error("month {month} out of range in '{raw}'")]
    MonthOutOfRange { raw: String, month: u32 },
}

/// Fatal: the run must not reach any stage
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0} (set it in the environment or .env)")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Record-level storage failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unresolved {kind} reference: {name}")]
    Unresolved { kind: &'static str, name: String },
}

// ============================================================================
// STAGE ERRORS
// ============================================================================

/// Pipeline stage a record error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    PostImport,
    Countries,
    Trips,
    TripCountries,
    PostAssignment,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PostImport => "post_import",
            Stage::Countries => "countries",
            Stage::Trips => "trips",
            Stage::TripCountries => "trip_countries",
            Stage::PostAssignment => "post_assignment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One swallowed per-record failure, kept for the summary and the error log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub record: String,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, record: impl Into<String>, message: impl ToString) -> Self {
        StageError {
            stage,
            record: record.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.record, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display() {
        let err = StageError::new(Stage::Trips, "Worldtrip", "constraint failed");
        assert_eq!(err.to_string(), "[trips] Worldtrip: constraint failed");
    }

    #[test]
    fn test_unresolved_reference_message() {
        let err = StoreError::Unresolved {
            kind: "country",
            name: "Atlantis".to_string(),
        };
        assert_eq!(err.to_string(), "unresolved country reference: Atlantis");
    }
}
