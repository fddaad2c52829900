// 🚀 Migration Orchestrator
// Travel log → countries → trips → trip↔country links → post assignment.
//
// Every stage is idempotent (upsert on natural keys, linker only touches
// unassigned posts) so a partially failed run can simply be repeated.
// Record-level failures are collected per stage and never abort the run.

use crate::db::{Event, TravelStore};
use crate::error::{Stage, StageError, StoreError};
use crate::linker::{assign_posts, LinkOutcome, LinkReport, PostRepository};
use crate::normalizer::{read_travel_log, RawRow};
use crate::reference::Country;
use crate::trips::{build_trip_report, Trip, TripBuildReport};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

const ACTOR: &str = "travel_log_migration";

// ============================================================================
// PLAN (parse + build, no writes)
// ============================================================================

/// Everything derived from the source table before touching storage
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub source: String,

    /// SHA-256 of the source bytes
    pub fingerprint: String,

    pub rows: Vec<RawRow>,
    pub build: TripBuildReport,
}

impl MigrationPlan {
    pub fn from_rows(source: &str, fingerprint: String, rows: Vec<RawRow>) -> Self {
        let build = build_trip_report(&rows);
        MigrationPlan {
            source: source.to_string(),
            fingerprint,
            rows,
            build,
        }
    }

    /// Parse source bytes (semicolon table) into a plan
    pub fn from_bytes(source: &str, bytes: &[u8]) -> Result<Self> {
        let rows = read_travel_log(bytes, source)?;
        Ok(Self::from_rows(source, fingerprint(bytes), rows))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read travel log: {}", path.display()))?;
        Self::from_bytes(&path.display().to_string(), &bytes)
    }

    pub fn trips(&self) -> &[Trip] {
        &self.build.trips
    }

    /// Every distinct country name seen across all rows, sorted
    pub fn country_names(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.country_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Operator preview: trips with date ranges and countries
    pub fn render_preview(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "📊 PREVIEW: {} countries  |  {} trips  ({} rows from {})",
            self.country_names().len(),
            self.trips().len(),
            self.rows.len(),
            self.source
        )?;
        writeln!(f)?;

        for trip in self.trips() {
            writeln!(f, "  • {:25} {}", trip.name, trip.date_range_label())?;
            writeln!(f, "    {}", trip.country_names().join(", "))?;
        }

        if !self.build.duplicates.is_empty() {
            writeln!(f)?;
            for dup in &self.build.duplicates {
                writeln!(
                    f,
                    "  ℹ️  duplicate dropped: {} in '{}' (line {})",
                    dup.country_name, dup.trip_name, dup.line_number
                )?;
            }
        }

        if !self.build.orphan_lines.is_empty() {
            writeln!(
                f,
                "  ⚠️  rows before the first trip name ignored: lines {:?}",
                self.build.orphan_lines
            )?;
        }

        Ok(())
    }
}

/// SHA-256 hex digest of the source table
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// CONFIRMATION GATE
// ============================================================================

/// Asked once, with the full preview, before any write
pub trait Confirm {
    fn confirm(&mut self, preview: &str) -> bool;
}

/// Gate that always proceeds (`--yes`)
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _preview: &str) -> bool {
        true
    }
}

// ============================================================================
// STATS + SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageStats {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<StageError>,
}

impl StageStats {
    fn ok(&mut self) {
        self.succeeded += 1;
    }

    fn fail(&mut self, error: StageError) {
        warn!("❌ {}", error);
        self.failed += 1;
        self.errors.push(error);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub countries: StageStats,
    pub trips: StageStats,
    pub trip_countries: StageStats,
    pub post_assignment: StageStats,
    pub posts_assigned: usize,
    pub duplicates_dropped: usize,
    pub deferred_trips: Vec<String>,
}

impl RunSummary {
    pub fn stages(&self) -> [(Stage, &StageStats); 4] {
        [
            (Stage::Countries, &self.countries),
            (Stage::Trips, &self.trips),
            (Stage::TripCountries, &self.trip_countries),
            (Stage::PostAssignment, &self.post_assignment),
        ]
    }

    pub fn all_errors(&self) -> impl Iterator<Item = &StageError> {
        self.stages().into_iter().flat_map(|(_, s)| s.errors.iter())
    }

    pub fn error_count(&self) -> usize {
        self.stages().iter().map(|(_, s)| s.errors.len()).sum()
    }

    /// Final report; every stage is listed even with zero successes
    pub fn render(&self, error_limit: usize) -> String {
        self.display(error_limit).to_string()
    }

    /// Displayable report showing at most `error_limit` errors per stage
    pub fn display(&self, error_limit: usize) -> SummaryDisplay<'_> {
        SummaryDisplay {
            summary: self,
            error_limit,
        }
    }

    /// Write every error as one JSON object per line
    pub fn write_error_log(&self, path: &Path) -> Result<usize> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create error log: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let mut written = 0;

        for err in self.all_errors() {
            serde_json::to_writer(&mut writer, err)?;
            writer.write_all(b"\n")?;
            written += 1;
        }

        writer.flush()?;
        Ok(written)
    }
}

pub struct SummaryDisplay<'a> {
    summary: &'a RunSummary,
    error_limit: usize,
}

impl fmt::Display for SummaryDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.summary;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "✅ MIGRATION FINISHED")?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  🌍 Countries:        {} ok, {} failed", s.countries.succeeded, s.countries.failed)?;
        writeln!(f, "  🗺️  Trips:            {} ok, {} failed", s.trips.succeeded, s.trips.failed)?;
        writeln!(f, "  🔗 Trip↔Country:     {} ok, {} failed", s.trip_countries.succeeded, s.trip_countries.failed)?;
        writeln!(f, "  📝 Posts assigned:   {}", s.posts_assigned)?;
        writeln!(f, "  ℹ️  Duplicates dropped: {}", s.duplicates_dropped)?;

        if !s.deferred_trips.is_empty() {
            writeln!(f, "\n  Left for manual assignment:")?;
            for name in &s.deferred_trips {
                writeln!(f, "  → {}", name)?;
            }
        }

        for (stage, stats) in s.stages() {
            if stats.errors.is_empty() {
                continue;
            }
            writeln!(f, "\n  ⚠️  {} errors in {}:", stats.errors.len(), stage)?;
            for err in stats.errors.iter().take(self.error_limit) {
                writeln!(f, "    - {}: {}", err.record, err.message)?;
            }
            if stats.errors.len() > self.error_limit {
                writeln!(f, "    ... and {} more", stats.errors.len() - self.error_limit)?;
            }
        }

        Ok(())
    }
}

// ============================================================================
// MIGRATOR
// ============================================================================

pub struct Migrator<'a, S: ?Sized> {
    store: &'a mut S,
    country_ids: HashMap<String, i64>,
    trip_ids: HashMap<String, i64>,
}

impl<'a, S> Migrator<'a, S>
where
    S: TravelStore + PostRepository + ?Sized,
{
    pub fn new(store: &'a mut S) -> Self {
        Migrator {
            store,
            country_ids: HashMap::new(),
            trip_ids: HashMap::new(),
        }
    }

    /// Show the preview, ask the gate, then run; `None` if declined
    pub fn run_confirmed<C: Confirm + ?Sized>(
        &mut self,
        plan: &MigrationPlan,
        gate: &mut C,
    ) -> Option<RunSummary> {
        if !gate.confirm(&plan.render_preview()) {
            info!("Migration declined at confirmation gate, nothing written");
            return None;
        }
        Some(self.run(plan))
    }

    /// Full run: (a) countries (b) trips (c) links (d) posts
    pub fn run(&mut self, plan: &MigrationPlan) -> RunSummary {
        self.audit(Event::new(
            "migration_started",
            "source",
            &plan.source,
            serde_json::json!({
                "fingerprint": plan.fingerprint,
                "rows": plan.rows.len(),
                "trips": plan.trips().len(),
            }),
            ACTOR,
        ));

        let mut summary = RunSummary {
            duplicates_dropped: plan.build.duplicates.len(),
            ..Default::default()
        };

        summary.countries = self.upsert_countries(&plan.country_names());
        summary.trips = self.upsert_trips(plan.trips());
        summary.trip_countries = self.upsert_trip_countries(plan.trips());

        let (stats, link_report) = self.assign_posts(plan.trips());
        summary.post_assignment = stats;
        summary.posts_assigned = link_report.assigned;
        summary.deferred_trips = link_report
            .deferred_trips()
            .into_iter()
            .map(String::from)
            .collect();

        self.audit(Event::new(
            "migration_finished",
            "source",
            &plan.source,
            serde_json::json!({
                "countries": summary.countries.succeeded,
                "trips": summary.trips.succeeded,
                "trip_countries": summary.trip_countries.succeeded,
                "posts_assigned": summary.posts_assigned,
                "errors": summary.error_count(),
            }),
            ACTOR,
        ));

        summary
    }

    /// Stage (a): one upsert per distinct country, then refresh the id map
    pub fn upsert_countries(&mut self, names: &[String]) -> StageStats {
        println!("\n🌍 STEP 1: COUNTRIES");
        let mut stats = StageStats::default();

        for name in names {
            let country = Country::from_name(name);
            match self.store.upsert_country(&country) {
                Ok(id) => {
                    println!("  ✓ {:30} ({})", name, country.iso_code.as_deref().unwrap_or("??"));
                    self.country_ids.insert(name.clone(), id);
                    stats.ok();
                }
                Err(e) => stats.fail(StageError::new(Stage::Countries, name, e)),
            }
        }

        match self.store.country_ids() {
            Ok(ids) => self.country_ids.extend(ids),
            Err(e) => stats.fail(StageError::new(Stage::Countries, "<reload ids>", e)),
        }

        stats
    }

    /// Stage (b): one upsert per trip, then refresh the id map
    pub fn upsert_trips(&mut self, trips: &[Trip]) -> StageStats {
        println!("\n🗺️  STEP 2: TRIPS");
        let mut stats = StageStats::default();

        for trip in trips {
            match self.store.upsert_trip(trip) {
                Ok(id) => {
                    println!("  ✓ {:25} {}", trip.name, trip.date_range_label());
                    self.trip_ids.insert(trip.name.clone(), id);
                    stats.ok();
                }
                Err(e) => stats.fail(StageError::new(Stage::Trips, &trip.name, e)),
            }
        }

        match self.store.trip_ids() {
            Ok(ids) => self.trip_ids.extend(ids),
            Err(e) => stats.fail(StageError::new(Stage::Trips, "<reload ids>", e)),
        }

        stats
    }

    /// Stage (c): one upsert per (trip, country) pair with its visit order
    pub fn upsert_trip_countries(&mut self, trips: &[Trip]) -> StageStats {
        println!("\n🔗 STEP 3: TRIP ↔ COUNTRIES");
        let mut stats = StageStats::default();

        for trip in trips {
            let Some(&trip_id) = self.trip_ids.get(&trip.name) else {
                let e = StoreError::Unresolved {
                    kind: "trip",
                    name: trip.name.clone(),
                };
                stats.fail(StageError::new(Stage::TripCountries, &trip.name, e));
                continue;
            };

            for visit in &trip.countries {
                let record = format!("{} → {}", trip.name, visit.country_name);

                let Some(&country_id) = self.country_ids.get(&visit.country_name) else {
                    let e = StoreError::Unresolved {
                        kind: "country",
                        name: visit.country_name.clone(),
                    };
                    stats.fail(StageError::new(Stage::TripCountries, record, e));
                    continue;
                };

                match self
                    .store
                    .upsert_trip_country(trip_id, country_id, visit.visit_order)
                {
                    Ok(()) => {
                        println!("  ✓ {}", record);
                        stats.ok();
                    }
                    Err(e) => stats.fail(StageError::new(Stage::TripCountries, record, e)),
                }
            }
        }

        stats
    }

    /// Stage (d): run the linker over the trips in their given order
    pub fn assign_posts(&mut self, trips: &[Trip]) -> (StageStats, LinkReport) {
        println!("\n📝 STEP 4: POSTS → TRIPS");
        let report = assign_posts(trips, &self.trip_ids, &mut *self.store);

        let mut stats = StageStats::default();
        for link in &report.links {
            match &link.outcome {
                LinkOutcome::Assigned { count, .. } => {
                    stats.ok();
                    self.audit(Event::new(
                        "posts_assigned",
                        "trip",
                        &link.trip_name,
                        serde_json::json!({ "count": count }),
                        ACTOR,
                    ));
                }
                LinkOutcome::NoNewPosts { .. } => stats.ok(),
                LinkOutcome::Deferred => {}
                LinkOutcome::Unresolved | LinkOutcome::Failed { .. } => stats.failed += 1,
            }
        }
        stats.errors = report.errors.clone();

        (stats, report)
    }

    fn audit(&mut self, event: Event) {
        if let Err(e) = self.store.record_event(&event) {
            warn!("Could not record {} event: {}", event.event_type, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SUMMARY_ERROR_LIMIT;
    use crate::db::{Post, SqliteStore, POST_DATE_FORMAT};
    use chrono::NaiveDateTime;

    const TRAVEL_LOG: &str = "Trip;Country;Companion;Start-time;End-time\n\
        Worldtrip;Singapore;Andi Danny;Fist-Post;11.Juli.2019\n\
        ;Vietnam;Micheal;;\n\
        ;Autstria;;;\n\
        Asia;Thailand;Lena;01.01.2020;\n\
        ;Cambodia;Lena;;\n\
        ;Cambodia;Lena;;\n\
        ;Philippines;;;31.01.2020\n\
        Climbing ;Spain;Andi;;\n";

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, POST_DATE_FORMAT).unwrap()
    }

    fn seeded_store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for (id, date) in [
            ("p-2018", "2018-03-01 09:00:00"),
            ("p-worldtrip-end", "2019-07-11 23:59:59"),
            ("p-gap", "2019-10-01 12:00:00"),
            ("p-asia", "2020-01-15 08:30:00"),
            ("p-asia-last", "2020-01-31 23:00:00"),
            ("p-after", "2020-02-01 00:00:00"),
        ] {
            store.insert_post(&Post::new(id, at(date))).unwrap();
        }
        store
    }

    fn plan() -> MigrationPlan {
        MigrationPlan::from_bytes("countries.csv", TRAVEL_LOG.as_bytes()).unwrap()
    }

    struct Decline;

    impl Confirm for Decline {
        fn confirm(&mut self, _preview: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_plan_preview() {
        let plan = plan();

        assert_eq!(plan.trips().len(), 3);
        assert_eq!(plan.fingerprint.len(), 64);

        let preview = plan.render_preview();
        assert!(preview.contains("Worldtrip"));
        assert!(preview.contains("[— → 2019-07-11]"));
        assert!(preview.contains("[2020-01-01 → 2020-01-31]"));
        assert!(preview.contains("duplicate dropped: Cambodia in 'Asia'"));
    }

    #[test]
    fn test_full_run() {
        let mut store = seeded_store();
        let plan = plan();

        let summary = Migrator::new(&mut store).run(&plan);

        // Singapore, Vietnam, Austria, Thailand, Cambodia, Philippines, Spain
        assert_eq!(summary.countries.succeeded, 7);
        assert_eq!(summary.trips.succeeded, 3);
        assert_eq!(summary.trip_countries.succeeded, 7);
        assert_eq!(summary.duplicates_dropped, 1);
        assert_eq!(summary.error_count(), 0);

        // Worldtrip claims everything up to 2019-07-11, Asia its January window
        assert_eq!(summary.posts_assigned, 4);
        assert_eq!(summary.deferred_trips, vec!["Climbing"]);

        let trip_ids = store.trip_ids().unwrap();
        assert_eq!(store.post_trip("p-2018").unwrap(), trip_ids.get("Worldtrip").copied());
        assert_eq!(store.post_trip("p-worldtrip-end").unwrap(), trip_ids.get("Worldtrip").copied());
        assert_eq!(store.post_trip("p-asia").unwrap(), trip_ids.get("Asia").copied());
        assert_eq!(store.post_trip("p-asia-last").unwrap(), trip_ids.get("Asia").copied());
        assert_eq!(store.post_trip("p-gap").unwrap(), None);
        assert_eq!(store.post_trip("p-after").unwrap(), None);

        let companions: String = store
            .connection()
            .query_row(
                "SELECT companions FROM trips WHERE trip_name = 'Worldtrip'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(companions, r#"["Andi","Danny","Michael"]"#);

        println!("✅ Full migration test PASSED");
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let mut store = seeded_store();
        let plan = plan();

        let first = Migrator::new(&mut store).run(&plan);
        let counts: Vec<i64> = ["countries", "trips", "trip_countries"]
            .iter()
            .map(|t| store.count(t).unwrap())
            .collect();

        let second = Migrator::new(&mut store).run(&plan);
        let counts_again: Vec<i64> = ["countries", "trips", "trip_countries"]
            .iter()
            .map(|t| store.count(t).unwrap())
            .collect();

        assert_eq!(first.posts_assigned, 4);
        assert_eq!(second.posts_assigned, 0);
        assert_eq!(counts, vec![7, 3, 7]);
        assert_eq!(counts, counts_again);

        println!("✅ Idempotent re-run test PASSED: 0 posts reassigned on second run");
    }

    #[test]
    fn test_declined_gate_writes_nothing() {
        let mut store = seeded_store();
        let summary = Migrator::new(&mut store).run_confirmed(&plan(), &mut Decline);

        assert!(summary.is_none());
        assert_eq!(store.count("countries").unwrap(), 0);
        assert_eq!(store.count("events").unwrap(), 0);
    }

    #[test]
    fn test_assume_yes_gate_runs() {
        let mut store = seeded_store();
        let summary = Migrator::new(&mut store).run_confirmed(&plan(), &mut AssumeYes);
        assert!(summary.is_some());
        assert_eq!(store.count("trips").unwrap(), 3);
    }

    /// SQLite store that rejects one country and/or one trip by name
    struct RejectingStore {
        inner: SqliteStore,
        reject_country: Option<&'static str>,
        reject_trip: Option<&'static str>,
    }

    impl TravelStore for RejectingStore {
        fn upsert_country(&mut self, country: &Country) -> Result<i64, StoreError> {
            if self.reject_country == Some(country.name.as_str()) {
                return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.inner.upsert_country(country)
        }
        fn upsert_trip(&mut self, trip: &Trip) -> Result<i64, StoreError> {
            if self.reject_trip == Some(trip.name.as_str()) {
                return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.inner.upsert_trip(trip)
        }
        fn upsert_trip_country(&mut self, t: i64, c: i64, o: u32) -> Result<(), StoreError> {
            self.inner.upsert_trip_country(t, c, o)
        }
        fn country_ids(&self) -> Result<HashMap<String, i64>, StoreError> {
            self.inner.country_ids()
        }
        fn trip_ids(&self) -> Result<HashMap<String, i64>, StoreError> {
            self.inner.trip_ids()
        }
        fn record_event(&mut self, event: &Event) -> Result<(), StoreError> {
            self.inner.record_event(event)
        }
    }

    impl PostRepository for RejectingStore {
        fn select_unassigned(
            &self,
            from: Option<NaiveDateTime>,
            until: NaiveDateTime,
        ) -> Result<Vec<String>, StoreError> {
            self.inner.select_unassigned(from, until)
        }
        fn assign_trip(&mut self, ids: &[String], trip_id: i64) -> Result<usize, StoreError> {
            self.inner.assign_trip(ids, trip_id)
        }
    }

    #[test]
    fn test_record_failures_do_not_abort() {
        let mut store = RejectingStore {
            inner: seeded_store(),
            reject_country: Some("Vietnam"),
            reject_trip: None,
        };

        let summary = Migrator::new(&mut store).run(&plan());

        assert_eq!(summary.countries.succeeded, 6);
        assert_eq!(summary.countries.failed, 1);
        // Worldtrip → Vietnam cannot be linked, everything else can
        assert_eq!(summary.trip_countries.succeeded, 6);
        assert_eq!(summary.trip_countries.failed, 1);
        assert!(summary.trip_countries.errors[0]
            .message
            .contains("unresolved country reference: Vietnam"));
        // later stages still ran
        assert_eq!(summary.trips.succeeded, 3);
        assert_eq!(summary.posts_assigned, 4);
        assert_eq!(summary.error_count(), 2);
    }

    #[test]
    fn test_unresolved_trip_skips_only_its_links() {
        let mut store = RejectingStore {
            inner: seeded_store(),
            reject_country: None,
            reject_trip: Some("Asia"),
        };

        let summary = Migrator::new(&mut store).run(&plan());

        assert_eq!(summary.trips.succeeded, 2);
        assert_eq!(summary.trips.failed, 1);

        // Asia's three visits are skipped as one unresolved trip reference
        assert_eq!(summary.trip_countries.failed, 1);
        assert_eq!(summary.trip_countries.errors[0].stage, Stage::TripCountries);
        assert_eq!(summary.trip_countries.errors[0].record, "Asia");
        assert!(summary.trip_countries.errors[0]
            .message
            .contains("unresolved trip reference: Asia"));

        // Worldtrip (3) and Climbing (1) still linked
        assert_eq!(summary.trip_countries.succeeded, 4);
        assert_eq!(store.inner.count("trip_countries").unwrap(), 4);

        // Asia's posts stay unassigned, Worldtrip still gets its two
        assert_eq!(summary.posts_assigned, 2);
        assert_eq!(summary.post_assignment.errors[0].record, "Asia");
        assert_eq!(store.inner.post_trip("p-asia").unwrap(), None);
        assert_eq!(summary.error_count(), 3);
    }

    #[test]
    fn test_summary_render_caps_errors() {
        let mut summary = RunSummary::default();
        for i in 0..12 {
            summary
                .countries
                .fail(StageError::new(Stage::Countries, format!("c{}", i), "boom"));
        }

        let text = summary.render(SUMMARY_ERROR_LIMIT);

        assert!(text.contains("Countries:        0 ok, 12 failed"));
        assert!(text.contains("Trips:            0 ok, 0 failed"));
        assert!(text.contains("c9: boom"));
        assert!(!text.contains("c10: boom"));
        assert!(text.contains("... and 2 more"));
    }

    #[test]
    fn test_error_log_has_every_error() {
        let mut summary = RunSummary::default();
        for i in 0..12 {
            summary
                .trips
                .fail(StageError::new(Stage::Trips, format!("t{}", i), "boom"));
        }
        summary
            .post_assignment
            .fail(StageError::new(Stage::PostAssignment, "Ghost", "missing"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.jsonl");
        let written = summary.write_error_log(&path).unwrap();

        assert_eq!(written, 13);
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 13);

        let last: StageError = serde_json::from_str(lines[12]).unwrap();
        assert_eq!(last.stage, Stage::PostAssignment);
        assert_eq!(last.record, "Ghost");
    }

    #[test]
    fn test_audit_events_recorded() {
        let mut store = seeded_store();
        let plan = plan();
        Migrator::new(&mut store).run(&plan);

        let events = store.get_events_for_entity("source", "countries.csv").unwrap();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .any(|e| e.event_type == "migration_started" && e.data["fingerprint"] == plan.fingerprint.as_str()));

        let asia = store.get_events_for_entity("trip", "Asia").unwrap();
        assert_eq!(asia[0].data["count"], 2);
    }
}
