// 🖼️ Media references
// Rewrites image URLs in the blog export to local paths and checks that the
// downloaded files are actually there.
//
// Local layout: {media_base}/{post_id}/block_{block_index}_{media_key}.{ext}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Field keeping the URL a media entry had before localization
pub const ORIGINAL_URL_FIELD: &str = "original_source_url";

/// Image media entries that have original dimensions, with their location
fn original_images<'a>(post: &'a Value) -> impl Iterator<Item = (usize, &'a Value)> + 'a {
    post.get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
        .filter(|(_, block)| block.get("type").and_then(Value::as_str) == Some("image"))
        .flat_map(|(idx, block)| {
            block
                .get("media")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter(|m| m.get("has_original_dimensions").and_then(Value::as_bool) == Some(true))
                .map(move |m| (idx, m))
        })
}

fn post_id(post: &Value) -> &str {
    post.get("id_string").and_then(Value::as_str).unwrap_or("unknown")
}

/// Extension of a URL's last path segment, query string dropped
pub fn url_extension(url: &str) -> &str {
    let last = url.rsplit('.').next().unwrap_or("");
    last.split('?').next().unwrap_or("")
}

/// Local path for one media entry
pub fn local_media_path(
    media_base: &str,
    post_id: &str,
    block_index: usize,
    media_key: &str,
    url: &str,
) -> String {
    let key = media_key.split(':').next().unwrap_or("");
    format!(
        "{}/{}/block_{}_{}.{}",
        media_base,
        post_id,
        block_index,
        key,
        url_extension(url)
    )
}

/// Rewrite every original-size image URL to its local path
///
/// Entries that already carry `original_source_url` are left alone, so a
/// second pass keeps the remote URL. Returns the number of entries rewritten.
pub fn localize_urls(posts: &mut [Value], media_base: &str) -> usize {
    let mut rewritten = 0;

    for post in posts.iter_mut() {
        let id = post_id(post).to_string();
        let Some(blocks) = post.get_mut("content").and_then(Value::as_array_mut) else {
            continue;
        };

        for (block_idx, block) in blocks.iter_mut().enumerate() {
            if block.get("type").and_then(Value::as_str) != Some("image") {
                continue;
            }
            let Some(media) = block.get_mut("media").and_then(Value::as_array_mut) else {
                continue;
            };

            for entry in media.iter_mut() {
                if entry.get("has_original_dimensions").and_then(Value::as_bool) != Some(true) {
                    continue;
                }
                let Some(obj) = entry.as_object_mut() else {
                    continue;
                };
                // Already localized on an earlier pass
                if obj.contains_key(ORIGINAL_URL_FIELD) {
                    continue;
                }

                let url = obj.get("url").and_then(Value::as_str).unwrap_or("").to_string();
                let key = obj.get("media_key").and_then(Value::as_str).unwrap_or("").to_string();
                let local = local_media_path(media_base, &id, block_idx, &key, &url);

                obj.insert(ORIGINAL_URL_FIELD.to_string(), Value::String(url));
                obj.insert("url".to_string(), Value::String(local));
                rewritten += 1;
            }
        }
    }

    rewritten
}

// ============================================================================
// VALIDATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingMedia {
    pub post_id: String,
    pub block: usize,
    pub url: String,
    pub expected_path: PathBuf,
    pub original_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaCheckReport {
    pub total: usize,
    pub found: usize,
    pub missing: Vec<MissingMedia>,
}

impl MediaCheckReport {
    /// Percentage of media files found (0 when there is no media)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.found as f64 / self.total as f64 * 100.0
        }
    }

    pub fn all_found(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check that every localized media URL resolves to a file under `root`
pub fn check_local_media(posts: &[Value], root: &Path) -> MediaCheckReport {
    let mut report = MediaCheckReport::default();

    for post in posts {
        for (block, media) in original_images(post) {
            report.total += 1;

            let url = media.get("url").and_then(Value::as_str).unwrap_or("");
            let expected_path = root.join(url.trim_start_matches('/'));

            if expected_path.is_file() {
                report.found += 1;
            } else {
                report.missing.push(MissingMedia {
                    post_id: post_id(post).to_string(),
                    block,
                    url: url.to_string(),
                    expected_path,
                    original_url: media
                        .get(ORIGINAL_URL_FIELD)
                        .and_then(Value::as_str)
                        .map(String::from),
                });
            }
        }
    }

    report
}

// ============================================================================
// FILE HELPERS
// ============================================================================

pub fn load_posts_json(path: &Path) -> Result<Vec<Value>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open export: {}", path.display()))?;
    let posts = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse export JSON from {}", path.display()))?;
    Ok(posts)
}

pub fn save_posts_json(path: &Path, posts: &[Value]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), posts)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
