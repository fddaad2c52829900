// 📅 Date Parser
// Travel log cells come in two shapes:
//   "11.Juli.2019"  day.month-name.year (English or German month names)
//   "11.07.2019"    day.month.year
// Empty cells and the "Fist-Post" marker mean "no date".

use crate::error::DateParseError;
use crate::reference::month_number;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Marker used in the source sheet for "no date, this is the first post"
pub const FIRST_POST_MARKER: &str = "Fist-Post";

static NAMED_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})\.([A-Za-zäöüÄÖÜ]+)\.(\d{4})").expect("valid named-month regex")
});
static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})").expect("valid numeric regex"));

/// Parse a travel-log date cell
///
/// # Returns
/// * `Ok(None)` - empty cell or the first-post marker
/// * `Ok(Some(date))` - one of the two supported formats matched
/// * `Err(DateParseError)` - non-empty but unrecognized
pub fn parse_date(raw: &str) -> Result<Option<NaiveDate>, DateParseError> {
    let raw = raw.trim();
    if raw.is_empty() || raw == FIRST_POST_MARKER {
        return Ok(None);
    }

    if let Some(caps) = NAMED_MONTH.captures(raw) {
        let month_name = &caps[2];
        let Some(month) = month_number(month_name) else {
            return Err(DateParseError::UnknownMonth {
                raw: raw.to_string(),
                month: month_name.to_string(),
            });
        };
        return build_date(raw, &caps[3], month, &caps[1]).map(Some);
    }

    if let Some(caps) = NUMERIC.captures(raw) {
        let month: u32 = caps[2]
            .parse()
            .map_err(|_| DateParseError::Unrecognized(raw.to_string()))?;
        return build_date(raw, &caps[3], month, &caps[1]).map(Some);
    }

    Err(DateParseError::Unrecognized(raw.to_string()))
}

/// Lenient variant used by the row normalizer: warn and continue with `None`
pub fn parse_date_or_warn(raw: &str) -> Option<NaiveDate> {
    match parse_date(raw) {
        Ok(date) => date,
        Err(e) => {
            warn!("⚠️  Could not parse date: {}", e);
            None
        }
    }
}

// Day overflow (31.04.) is clamped to the month's last day instead of rejected.
// Day 0 is not a day at all.
fn build_date(raw: &str, year: &str, month: u32, day: &str) -> Result<NaiveDate, DateParseError> {
    let unrecognized = || DateParseError::Unrecognized(raw.to_string());
    let year: i32 = year.parse().map_err(|_| unrecognized())?;
    let day: u32 = day.parse().map_err(|_| unrecognized())?;
    if day == 0 {
        return Err(unrecognized());
    }

    if !(1..=12).contains(&month) {
        return Err(DateParseError::MonthOutOfRange {
            raw: raw.to_string(),
            month,
        });
    }

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(unrecognized)?;
    let last_day = last_day_of_month(first);
    let day = day.min(last_day);

    first.with_day(day).ok_or_else(unrecognized)
}

fn last_day_of_month(first: NaiveDate) -> u32 {
    let (y, m) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|next| next.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}
