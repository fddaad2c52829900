use crate::error::StoreError;
use crate::linker::PostRepository;
use crate::reference::Country;
use crate::trips::Trip;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Storage format of `posts.post_date` (UTC, fixed width so text order = time order)
pub const POST_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Insert-or-update access to the trip/country tables
///
/// Every write is keyed by a natural unique key (country name, trip name, or
/// the trip/country pair), so re-running a migration converges instead of
/// duplicating.
pub trait TravelStore {
    fn upsert_country(&mut self, country: &Country) -> Result<i64, StoreError>;

    fn upsert_trip(&mut self, trip: &Trip) -> Result<i64, StoreError>;

    fn upsert_trip_country(
        &mut self,
        trip_id: i64,
        country_id: i64,
        visit_order: u32,
    ) -> Result<(), StoreError>;

    /// name → country_id for every persisted country
    fn country_ids(&self) -> Result<HashMap<String, i64>, StoreError>;

    /// trip_name → trip_id for every persisted trip
    fn trip_ids(&self) -> Result<HashMap<String, i64>, StoreError>;

    fn record_event(&mut self, event: &Event) -> Result<(), StoreError>;
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// POSTS
// ============================================================================

/// A blog post row as the linker and the importer see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    pub post_date: NaiveDateTime,
    pub slug: Option<String>,
    pub original_url: Option<String>,
    pub summary: Option<String>,
    pub media_count: i64,
    pub trip_id: Option<i64>,
}

impl Post {
    pub fn new(post_id: impl Into<String>, post_date: NaiveDateTime) -> Self {
        Post {
            post_id: post_id.into(),
            post_date,
            slug: None,
            original_url: None,
            summary: None,
            media_count: 0,
            trip_id: None,
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS countries (
            country_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            iso_code TEXT,
            continent TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS trips (
            trip_id INTEGER PRIMARY KEY AUTOINCREMENT,
            trip_name TEXT UNIQUE NOT NULL,
            start_date TEXT,
            end_date TEXT,
            companions TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS trip_countries (
            trip_id INTEGER NOT NULL REFERENCES trips(trip_id),
            country_id INTEGER NOT NULL REFERENCES countries(country_id),
            visit_order INTEGER NOT NULL,
            UNIQUE (trip_id, country_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS posts (
            post_id TEXT PRIMARY KEY,
            post_date TEXT NOT NULL,
            slug TEXT,
            original_url TEXT,
            summary TEXT,
            media_count INTEGER NOT NULL DEFAULT 0,
            trip_id INTEGER REFERENCES trips(trip_id),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_posts_unassigned ON posts(trip_id, post_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        setup_database(&conn).context("Failed to initialize schema")?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Row count of one of the migration tables
    pub fn count(&self, table: &str) -> Result<i64> {
        let table = match table {
            "countries" | "trips" | "trip_countries" | "posts" | "events" => table,
            other => anyhow::bail!("Unknown table: {}", other),
        };
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert a post unless its id already exists; true when inserted
    pub fn insert_post(&mut self, post: &Post) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "INSERT INTO posts (post_id, post_date, slug, original_url, summary, media_count, trip_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(post_id) DO NOTHING",
            params![
                post.post_id,
                post.post_date.format(POST_DATE_FORMAT).to_string(),
                post.slug,
                post.original_url,
                post.summary,
                post.media_count,
                post.trip_id,
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn post_exists(&self, post_id: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM posts WHERE post_id = ?1",
                params![post_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// trip_id of a post, `None` if unassigned or unknown
    pub fn post_trip(&self, post_id: &str) -> Result<Option<i64>, StoreError> {
        let trip_id = self
            .conn
            .query_row(
                "SELECT trip_id FROM posts WHERE post_id = ?1",
                params![post_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(trip_id.flatten())
    }

    pub fn get_events_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<Event>> {
        get_events_for_entity(&self.conn, entity_type, entity_id)
    }
}

impl TravelStore for SqliteStore {
    fn upsert_country(&mut self, country: &Country) -> Result<i64, StoreError> {
        let id = self.conn.query_row(
            "INSERT INTO countries (name, iso_code, continent) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                iso_code = excluded.iso_code,
                continent = excluded.continent
             RETURNING country_id",
            params![country.name, country.iso_code, country.continent],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn upsert_trip(&mut self, trip: &Trip) -> Result<i64, StoreError> {
        let companions = trip.companions();
        let companions_json = if companions.is_empty() {
            None
        } else {
            // Vec<String> always serializes
            serde_json::to_string(&companions).ok()
        };

        let id = self.conn.query_row(
            "INSERT INTO trips (trip_name, start_date, end_date, companions) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(trip_name) DO UPDATE SET
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                companions = excluded.companions
             RETURNING trip_id",
            params![
                trip.name,
                trip.start_date.map(|d| d.to_string()),
                trip.end_date.map(|d| d.to_string()),
                companions_json,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn upsert_trip_country(
        &mut self,
        trip_id: i64,
        country_id: i64,
        visit_order: u32,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO trip_countries (trip_id, country_id, visit_order) VALUES (?1, ?2, ?3)
             ON CONFLICT(trip_id, country_id) DO UPDATE SET visit_order = excluded.visit_order",
            params![trip_id, country_id, visit_order],
        )?;
        Ok(())
    }

    fn country_ids(&self) -> Result<HashMap<String, i64>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT name, country_id FROM countries")?;
        let map = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<HashMap<String, i64>>>()?;
        Ok(map)
    }

    fn trip_ids(&self) -> Result<HashMap<String, i64>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT trip_name, trip_id FROM trips")?;
        let map = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<HashMap<String, i64>>>()?;
        Ok(map)
    }

    fn record_event(&mut self, event: &Event) -> Result<(), StoreError> {
        insert_event(&self.conn, event)
    }
}

impl PostRepository for SqliteStore {
    fn select_unassigned(
        &self,
        from: Option<NaiveDateTime>,
        until: NaiveDateTime,
    ) -> Result<Vec<String>, StoreError> {
        let from = from.map(|f| f.format(POST_DATE_FORMAT).to_string());
        let until = until.format(POST_DATE_FORMAT).to_string();

        let mut stmt = self.conn.prepare(
            "SELECT post_id FROM posts
             WHERE trip_id IS NULL
               AND post_date <= ?2
               AND (?1 IS NULL OR post_date >= ?1)
             ORDER BY post_date",
        )?;

        let ids = stmt
            .query_map(params![from, until], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn assign_trip(&mut self, post_ids: &[String], trip_id: i64) -> Result<usize, StoreError> {
        if post_ids.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut updated = 0;

        // SQLite caps bound parameters, so batch the IN list
        for chunk in post_ids.chunks(500) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "UPDATE posts SET trip_id = ? WHERE trip_id IS NULL AND post_id IN ({})",
                placeholders
            );

            let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() + 1);
            bound.push(&trip_id);
            bound.extend(chunk.iter().map(|id| id as &dyn ToSql));
            updated += tx.execute(&sql, bound.as_slice())?;
        }

        tx.commit()?;
        Ok(updated)
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<(), StoreError> {
    let data_json = event.data.to_string();

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(event_id, ts, event_type, entity_type, entity_id, data, actor)| {
            Ok(Event {
                event_id,
                timestamp: DateTime::parse_from_rfc3339(&ts)
                    .with_context(|| format!("Bad event timestamp: {}", ts))?
                    .with_timezone(&Utc),
                event_type,
                entity_type,
                entity_id,
                data: serde_json::from_str(&data).context("Bad event payload")?,
                actor,
            })
        })
        .collect()
}
