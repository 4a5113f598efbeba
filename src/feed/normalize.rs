//! Item extraction from loosely structured upstream responses.
//!
//! The same logical list arrives in several shapes depending on endpoint and
//! API version. Each known shape is a [`ShapeStrategy`]; strategies are tried
//! in [`SHAPE_ORDER`] and the first structural match wins.

use serde_json::{Map, Value};

/// One content record (post, video, reel, user). No schema is assumed.
pub type Item = Map<String, Value>;

/// How deep [`ShapeStrategy::EdgeNodeGraph`] searches for an `edges` array.
const MAX_EDGE_DEPTH: usize = 5;

/// A single way of locating the item list inside a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeStrategy {
    /// The response itself is the list
    ArrayShape,
    /// `data` is the list, or an object holding an `items` list
    NestedDataItems,
    /// A top-level field with a conventional name
    NamedField(&'static str),
    /// A GraphQL-style `edges: [{ node: {..} }]` structure somewhere in the response
    EdgeNodeGraph,
}

/// Resolution order used by [`extract_items`].
pub const SHAPE_ORDER: &[ShapeStrategy] = &[
    ShapeStrategy::ArrayShape,
    ShapeStrategy::NestedDataItems,
    ShapeStrategy::NamedField("items"),
    ShapeStrategy::NamedField("posts"),
    ShapeStrategy::NamedField("videos"),
    ShapeStrategy::NamedField("reels"),
    ShapeStrategy::NamedField("following"),
    ShapeStrategy::NamedField("followers"),
    ShapeStrategy::NamedField("users"),
    ShapeStrategy::EdgeNodeGraph,
];

impl ShapeStrategy {
    /// Returns the raw entries if `raw` has this shape, `None` otherwise.
    #[must_use]
    pub fn apply(self, raw: &Value) -> Option<Vec<&Value>> {
        match self {
            Self::ArrayShape => raw.as_array().map(|a| a.iter().collect()),
            Self::NestedDataItems => {
                let data = raw.get("data")?;
                if let Some(items) = data.get("items").and_then(Value::as_array) {
                    return Some(items.iter().collect());
                }
                data.as_array().map(|a| a.iter().collect())
            }
            Self::NamedField(name) => raw
                .get(name)
                .and_then(Value::as_array)
                .map(|a| a.iter().collect()),
            Self::EdgeNodeGraph => find_edges(raw, 0)
                .map(|edges| edges.iter().map(|e| e.get("node").unwrap_or(e)).collect()),
        }
    }
}

fn find_edges(value: &Value, depth: usize) -> Option<&Vec<Value>> {
    if depth > MAX_EDGE_DEPTH {
        return None;
    }
    let obj = value.as_object()?;
    if let Some(edges) = obj.get("edges").and_then(Value::as_array) {
        return Some(edges);
    }
    obj.values().find_map(|v| find_edges(v, depth + 1))
}

/// Extracts the ordered item list from `raw` using [`SHAPE_ORDER`].
///
/// Never fails: an unrecognised shape yields an empty list.
#[must_use]
pub fn extract_items(raw: &Value) -> Vec<Item> {
    extract_items_with(raw, SHAPE_ORDER)
}

/// Extracts items using a caller-supplied strategy order.
///
/// Entries wrapping their content under `media` are unwrapped. Entries that
/// are not JSON objects are skipped.
#[must_use]
pub fn extract_items_with(raw: &Value, strategies: &[ShapeStrategy]) -> Vec<Item> {
    let Some(entries) = strategies.iter().find_map(|s| s.apply(raw)) else {
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let inner = entry.get("media").filter(|m| m.is_object()).unwrap_or(entry);
            inner.as_object().cloned()
        })
        .collect()
}

/// Renders a string or number field as a non-empty string.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
