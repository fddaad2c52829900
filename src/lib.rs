// Travel Log Migration - Core Library
// Travel log sheet → trips/countries → SQLite, plus post ↔ trip linking.

pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod linker;
pub mod media;
pub mod migration;
pub mod normalizer;
pub mod posts;
pub mod reference;
pub mod trips;

// Re-export commonly used types
pub use config::{Config, ConfigOverrides};
pub use dates::{parse_date, parse_date_or_warn};
pub use db::{setup_database, Event, Post, SqliteStore, TravelStore};
pub use error::{ConfigError, DateParseError, Stage, StageError, StoreError};
pub use linker::{assign_posts, LinkOutcome, LinkPolicy, LinkReport, PostRepository};
pub use media::{check_local_media, localize_urls, MediaCheckReport};
pub use migration::{AssumeYes, Confirm, MigrationPlan, Migrator, RunSummary, StageStats};
pub use normalizer::{load_travel_log, normalize_record, parse_companions, RawRow};
pub use posts::{import_posts, load_export, ExportPost};
pub use reference::Country;
pub use trips::{build_trips, CarryState, CountryVisit, Trip, TripBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
