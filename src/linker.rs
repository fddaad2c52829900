// 🔗 Trip-Post Linker
// Assigns unassigned posts to trips by date-range containment.
//
// Three policies, chosen by which dates a trip has:
//   Bounded     start + end  → start 00:00:00 ..= end 23:59:59
//   OpenStart   end only     → everything up to end 23:59:59
//   Unassignable no end      → left for manual assignment
//
// Every selection filters on "trip_id IS NULL" and assignment happens before
// the next trip is queried, so the earlier trip in the list wins an overlap.

use crate::error::{Stage, StageError, StoreError};
use crate::trips::Trip;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

// ============================================================================
// POST REPOSITORY
// ============================================================================

/// The slice of post storage the linker needs
pub trait PostRepository {
    /// Ids of posts with `trip_id IS NULL` and `from <= post_date <= until`
    /// (no lower bound when `from` is `None`)
    fn select_unassigned(
        &self,
        from: Option<NaiveDateTime>,
        until: NaiveDateTime,
    ) -> Result<Vec<String>, StoreError>;

    /// Set `trip_id` on the given posts, returning how many were updated
    fn assign_trip(&mut self, post_ids: &[String], trip_id: i64) -> Result<usize, StoreError>;
}

// ============================================================================
// POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkPolicy {
    Bounded { start: NaiveDate, end: NaiveDate },
    OpenStart { end: NaiveDate },
    Unassignable,
}

impl LinkPolicy {
    pub fn for_trip(trip: &Trip) -> Self {
        match (trip.start_date, trip.end_date) {
            (Some(start), Some(end)) => LinkPolicy::Bounded { start, end },
            (None, Some(end)) => LinkPolicy::OpenStart { end },
            (_, None) => LinkPolicy::Unassignable,
        }
    }

    /// Selection window, `None` for unassignable trips
    pub fn window(&self) -> Option<(Option<NaiveDateTime>, NaiveDateTime)> {
        match *self {
            LinkPolicy::Bounded { start, end } => {
                Some((Some(start.and_time(NaiveTime::MIN)), end_of_day(end)))
            }
            LinkPolicy::OpenStart { end } => Some((None, end_of_day(end))),
            LinkPolicy::Unassignable => None,
        }
    }
}

/// Last second of the calendar day
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN))
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkOutcome {
    Assigned { policy: LinkPolicy, count: usize },
    NoNewPosts { policy: LinkPolicy },
    Deferred,
    Unresolved,
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripLink {
    pub trip_name: String,
    pub outcome: LinkOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkReport {
    pub links: Vec<TripLink>,
    pub assigned: usize,
    pub errors: Vec<StageError>,
}

impl LinkReport {
    pub fn deferred_trips(&self) -> Vec<&str> {
        self.links
            .iter()
            .filter(|l| l.outcome == LinkOutcome::Deferred)
            .map(|l| l.trip_name.as_str())
            .collect()
    }
}

// ============================================================================
// LINKER
// ============================================================================

/// Assign posts to trips, processing trips in the given order
///
/// `trip_ids` maps trip names to persisted ids; trips missing from it are
/// skipped and reported.
pub fn assign_posts<R: PostRepository + ?Sized>(
    trips: &[Trip],
    trip_ids: &HashMap<String, i64>,
    repo: &mut R,
) -> LinkReport {
    let mut report = LinkReport::default();

    for trip in trips {
        let outcome = link_trip(trip, trip_ids, repo);

        match &outcome {
            LinkOutcome::Assigned { count, .. } => {
                println!("  ✓ {:25} {}  {} posts assigned", trip.name, trip.date_range_label(), count);
                report.assigned += count;
            }
            LinkOutcome::NoNewPosts { .. } => {
                println!("  ⏭️  {:25} no new posts in range", trip.name);
            }
            LinkOutcome::Deferred => {
                println!(
                    "  ⏸️  {:25} → manual ({})",
                    trip.name,
                    trip.country_names().join(", ")
                );
            }
            LinkOutcome::Unresolved => {
                warn!("Trip id missing for '{}', assignment skipped", trip.name);
                report.errors.push(StageError::new(
                    Stage::PostAssignment,
                    &trip.name,
                    StoreError::Unresolved {
                        kind: "trip",
                        name: trip.name.clone(),
                    },
                ));
            }
            LinkOutcome::Failed { message } => {
                warn!("Assigning posts to '{}' failed: {}", trip.name, message);
                report
                    .errors
                    .push(StageError::new(Stage::PostAssignment, &trip.name, message));
            }
        }

        report.links.push(TripLink {
            trip_name: trip.name.clone(),
            outcome,
        });
    }

    report
}

fn link_trip<R: PostRepository + ?Sized>(
    trip: &Trip,
    trip_ids: &HashMap<String, i64>,
    repo: &mut R,
) -> LinkOutcome {
    let policy = LinkPolicy::for_trip(trip);
    let Some((from, until)) = policy.window() else {
        return LinkOutcome::Deferred;
    };

    let Some(&trip_id) = trip_ids.get(&trip.name) else {
        return LinkOutcome::Unresolved;
    };

    let post_ids = match repo.select_unassigned(from, until) {
        Ok(ids) => ids,
        Err(e) => return LinkOutcome::Failed { message: e.to_string() },
    };

    debug!("{}: {} unassigned posts in window", trip.name, post_ids.len());

    if post_ids.is_empty() {
        return LinkOutcome::NoNewPosts { policy };
    }

    match repo.assign_trip(&post_ids, trip_id) {
        Ok(count) => LinkOutcome::Assigned { policy, count },
        Err(e) => LinkOutcome::Failed { message: e.to_string() },
    }
}
