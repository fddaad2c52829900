// 📝 Post ingestion
// Seeds the post table from the blog export (a JSON array of posts) so the
// linker has something to assign. Only the columns the migration needs are
// mapped; existing post ids are skipped.

use crate::db::{Post, SqliteStore};
use crate::error::{Stage, StageError};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::warn;

const SUMMARY_MAX_CHARS: usize = 500;

/// Post as it appears in the export (unknown fields ignored)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExportPost {
    pub id_string: String,

    /// "2019-07-11 10:23:45 GMT"
    #[serde(default)]
    pub date: Option<String>,

    /// Unix seconds, used when `date` is missing or malformed
    #[serde(default)]
    pub timestamp: Option<i64>,

    #[serde(default)]
    pub slug: Option<String>,

    #[serde(default)]
    pub post_url: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub content: Vec<serde_json::Value>,
}

impl ExportPost {
    /// Post date from the `date` string, else from `timestamp`
    pub fn post_date(&self) -> Result<NaiveDateTime> {
        if let Some(date) = self.date.as_deref() {
            if let Some(parsed) = parse_export_date(date) {
                return Ok(parsed);
            }
        }

        self.timestamp
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| anyhow!("post {} has no usable date or timestamp", self.id_string))
    }

    /// Export summary, or the first text block truncated
    pub fn summary_text(&self) -> Option<String> {
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.is_empty()) {
            return Some(summary.to_string());
        }

        self.content
            .iter()
            .find(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .and_then(|block| block.get("text").and_then(|t| t.as_str()))
            .map(|text| text.chars().take(SUMMARY_MAX_CHARS).collect())
    }

    pub fn media_count(&self) -> i64 {
        self.content
            .iter()
            .filter(|block| {
                matches!(
                    block.get("type").and_then(|t| t.as_str()),
                    Some("image" | "video" | "audio")
                )
            })
            .count() as i64
    }

    pub fn to_post(&self) -> Result<Post> {
        Ok(Post {
            post_id: self.id_string.clone(),
            post_date: self.post_date()?,
            slug: self.slug.clone(),
            original_url: self.post_url.clone(),
            summary: self.summary_text(),
            media_count: self.media_count(),
            trip_id: None,
        })
    }
}

/// "YYYY-MM-DD HH:MM:SS" with an optional trailing zone name (GMT/UTC)
pub fn parse_export_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let without_zone = raw
        .strip_suffix(" GMT")
        .or_else(|| raw.strip_suffix(" UTC"))
        .unwrap_or(raw);
    NaiveDateTime::parse_from_str(without_zone, "%Y-%m-%d %H:%M:%S").ok()
}

pub fn load_export(path: &Path) -> Result<Vec<ExportPost>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open export: {}", path.display()))?;
    let posts = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse export JSON from {}", path.display()))?;
    Ok(posts)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub inserted: usize,
    pub skipped: usize,
    pub errors: Vec<StageError>,
}

/// Insert every post not yet present; failures are recorded per post
pub fn import_posts(store: &mut SqliteStore, posts: &[ExportPost]) -> ImportStats {
    let mut stats = ImportStats::default();
    let total = posts.len();

    for (idx, export) in posts.iter().enumerate() {
        let result = export
            .to_post()
            .and_then(|post| store.insert_post(&post).map_err(Into::into));

        match result {
            Ok(true) => {
                println!("  [{}/{}] ✓ {}", idx + 1, total, export.id_string);
                stats.inserted += 1;
            }
            Ok(false) => stats.skipped += 1,
            Err(e) => {
                warn!("Post {} not imported: {}", export.id_string, e);
                stats
                    .errors
                    .push(StageError::new(Stage::PostImport, &export.id_string, e));
            }
        }
    }

    println!("✓ Inserted: {} posts", stats.inserted);
    println!("✓ Skipped existing: {}", stats.skipped);

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn export(value: serde_json::Value) -> ExportPost {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_export_date_with_zone() {
        let parsed = parse_export_date("2019-07-11 10:23:45 GMT").unwrap();
        assert_eq!(parsed.to_string(), "2019-07-11 10:23:45");
        assert!(parse_export_date("11.07.2019").is_none());
    }

    #[test]
    fn test_timestamp_fallback() {
        let post = export(json!({
            "id_string": "1",
            "date": "not a date",
            "timestamp": 1562840625
        }));
        assert_eq!(post.post_date().unwrap().to_string(), "2019-07-11 10:23:45");

        let post = export(json!({ "id_string": "2" }));
        assert!(post.post_date().is_err());
    }

    #[test]
    fn test_summary_falls_back_to_first_text_block() {
        let long = "x".repeat(600);
        let post = export(json!({
            "id_string": "1",
            "content": [
                { "type": "image", "media": [] },
                { "type": "text", "text": long },
                { "type": "text", "text": "second" }
            ]
        }));

        let summary = post.summary_text().unwrap();
        assert_eq!(summary.chars().count(), 500);
        assert_eq!(post.media_count(), 1);
    }

    #[test]
    fn test_import_skips_existing() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let posts = vec![
            export(json!({ "id_string": "a", "date": "2019-01-01 10:00:00 GMT" })),
            export(json!({ "id_string": "b", "date": "2019-01-02 10:00:00 GMT" })),
            export(json!({ "id_string": "broken" })),
        ];

        let first = import_posts(&mut store, &posts);
        let second = import_posts(&mut store, &posts);

        assert_eq!(first.inserted, 2);
        assert_eq!(first.errors.len(), 1);
        assert_eq!(first.errors[0].record, "broken");
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(store.count("posts").unwrap(), 2);
    }

    #[test]
    fn test_load_export_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        std::fs::write(
            &path,
            r#"[{"id_string": "42", "date": "2020-01-15 08:30:00 GMT", "slug": "bangkok", "extra": true}]"#,
        )
        .unwrap();

        let posts = load_export(&path).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].slug.as_deref(), Some("bangkok"));
    }
}
