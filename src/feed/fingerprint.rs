//! Heuristic deduplication keys for items.
//!
//! The upstream re-serves the same content across pages with different
//! wrapper metadata, so no single field is a reliable primary key. An item is
//! described by up to three candidate keys (caption prefix, primary image URL,
//! identifier); matching on any of them marks it as already seen.

use std::collections::HashSet;

use serde_json::Value;

use super::normalize::{scalar_string, Item};

/// Number of characters of the trimmed caption used as the text key.
pub const TEXT_KEY_CHARS: usize = 100;

const ID_FIELDS: &[&str] = &["id", "pk", "media_id", "code"];
const CANDIDATE_LISTS: &[&str] = &["image_versions2", "image_versions"];
const COVER_FIELDS: &[&str] = &[
    "thumbnail_url",
    "thumbnail_src",
    "display_url",
    "cover_url",
    "video_cover_url",
];

/// A candidate key tagged with its origin, so a caption never matches an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FingerprintKey {
    Text(String),
    Image(String),
    Id(String),
}

/// Candidate keys of one item, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    pub text: Option<String>,
    pub image: Option<String>,
    pub id: Option<String>,
}

impl Fingerprint {
    #[must_use]
    pub fn of(item: &Item) -> Self {
        Self {
            text: caption_text(item).and_then(|t| text_key(&t)),
            image: primary_image_url(item),
            id: identifier(item),
        }
    }

    /// `true` when the item carries nothing to identify it by.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.text.is_none() && self.image.is_none() && self.id.is_none()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<FingerprintKey> {
        let mut keys = Vec::with_capacity(3);
        if let Some(text) = &self.text {
            keys.push(FingerprintKey::Text(text.clone()));
        }
        if let Some(image) = &self.image {
            keys.push(FingerprintKey::Image(image.clone()));
        }
        if let Some(id) = &self.id {
            keys.push(FingerprintKey::Id(id.clone()));
        }
        keys
    }
}

/// Keys recorded during one aggregation run.
#[derive(Debug, Default)]
pub struct SeenSet {
    keys: HashSet<FingerprintKey>,
}

impl SeenSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the fingerprint and returns `true` if the item is new.
    ///
    /// An item is a duplicate when any of its keys was recorded before. All of
    /// its keys are recorded either way. Empty fingerprints are always new.
    pub fn admit(&mut self, fingerprint: &Fingerprint) -> bool {
        if fingerprint.is_empty() {
            return true;
        }
        let keys = fingerprint.keys();
        let duplicate = keys.iter().any(|k| self.keys.contains(k));
        self.keys.extend(keys);
        !duplicate
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Raw caption of an item: `caption` as a string or `{ "text": .. }`, then
/// `text`, then the graph-shaped `edge_media_to_caption`.
#[must_use]
pub fn caption_text(item: &Item) -> Option<String> {
    let caption = match item.get("caption") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => obj.get("text").and_then(Value::as_str).map(String::from),
        _ => None,
    };
    caption
        .or_else(|| item.get("text").and_then(Value::as_str).map(String::from))
        .or_else(|| {
            item.get("edge_media_to_caption")
                .and_then(|c| c.get("edges"))
                .and_then(|e| e.get(0))
                .and_then(|e| e.pointer("/node/text"))
                .and_then(Value::as_str)
                .map(String::from)
        })
}

fn text_key(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let prefix: String = trimmed.chars().take(TEXT_KEY_CHARS).collect();
    Some(prefix.trim_end().to_string())
}

/// Primary image of an item.
///
/// Order: `image_url`, the best-ranked entry of the image candidate list, a
/// cover/thumbnail field, then the first carousel child (recursively).
#[must_use]
pub fn primary_image_url(item: &Item) -> Option<String> {
    if let Some(url) = item.get("image_url").and_then(non_empty_str) {
        return Some(url);
    }

    let candidates = CANDIDATE_LISTS.iter().find_map(|field| {
        item.get(*field)
            .and_then(|v| v.get("candidates"))
            .and_then(Value::as_array)
    });
    if let Some(url) = candidates.and_then(|c| best_candidate(c)) {
        return Some(url);
    }

    if let Some(url) = COVER_FIELDS
        .iter()
        .find_map(|field| item.get(*field).and_then(non_empty_str))
    {
        return Some(url);
    }

    item.get("carousel_media")
        .and_then(Value::as_array)
        .and_then(|children| children.first())
        .and_then(Value::as_object)
        .and_then(primary_image_url)
}

/// Picks the largest candidate by `width * height`, or the first one with a
/// URL when no dimensions are given. Ties keep the earlier candidate.
fn best_candidate(candidates: &[Value]) -> Option<String> {
    let mut first: Option<String> = None;
    let mut best: Option<(u64, String)> = None;

    for candidate in candidates {
        let Some(url) = candidate.get("url").and_then(non_empty_str) else {
            continue;
        };
        if first.is_none() {
            first = Some(url.clone());
        }
        let width = candidate.get("width").and_then(Value::as_u64);
        let height = candidate.get("height").and_then(Value::as_u64);
        if let (Some(w), Some(h)) = (width, height) {
            let area = w.saturating_mul(h);
            if best.as_ref().is_none_or(|(a, _)| area > *a) {
                best = Some((area, url));
            }
        }
    }

    best.map(|(_, url)| url).or(first)
}

fn identifier(item: &Item) -> Option<String> {
    ID_FIELDS
        .iter()
        .find_map(|field| item.get(*field).and_then(scalar_string))
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
}
