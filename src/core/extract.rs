//! Mapping terminal success records to result URLs.
//!
//! Image kinds yield one entry per result item, keeping `None` for items that
//! carry neither a full-resolution nor a cover URL. Video yields a single URL
//! and treats its absence as an error.

use serde_json::Value;

use super::models::{GenerationOutput, JobKind};
use crate::error::{GenError, Result};

/// Extract the output for a terminal success record.
///
/// # Errors
/// Returns [`GenError::ResultMissing`] when a video record has no URL.
pub fn extract(kind: JobKind, job_id: &str, record: &Value) -> Result<GenerationOutput> {
    if kind.is_image_like() {
        Ok(GenerationOutput::Images(image_urls(record)))
    } else {
        video_url(record)
            .map(GenerationOutput::Video)
            .ok_or_else(|| GenError::ResultMissing {
                job_id: job_id.to_string(),
            })
    }
}

/// Per-item URLs from an image history record.
#[must_use]
pub fn image_urls(record: &Value) -> Vec<Option<String>> {
    record
        .get("item_list")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(item_url).collect())
        .unwrap_or_default()
}

fn item_url(item: &Value) -> Option<String> {
    let full = item
        .pointer("/image/large_images/0/image_url")
        .and_then(non_empty);
    full.or_else(|| item.pointer("/common_attr/cover_url").and_then(non_empty))
}

fn video_url(record: &Value) -> Option<String> {
    record.pointer("/result/video_url").and_then(non_empty)
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
