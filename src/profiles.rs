//! User and post helpers around the upstream API.
//!
//! Resolves user references typed into chat (id, `@name`, profile URL) to
//! numeric ids, pulls user lists out of follow/recommendation responses and
//! picks relayable media URLs out of post responses.

use lazy_regex::lazy_regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::feed::fingerprint::primary_image_url;
use crate::feed::normalize::{extract_items_with, scalar_string, Item, ShapeStrategy};
use crate::feed::RateGovernor;
use crate::upstream::{ScraperClient, UpstreamError};

/// Profile URL: instagram.com/<name> or instagram.com/u/<name>
static RE_PROFILE_URL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"instagram\.com/(?:u/)?([A-Za-z0-9._]+)");

/// Post URL: /p/<code>, /reel/<code>, /reels/<code> or /tv/<code>
static RE_POST_URL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"instagram\.com/(?:[A-Za-z0-9._]+/)?(?:p|reels?|tv)/([A-Za-z0-9_-]+)");

/// Bare username as accepted by the platform
static RE_USERNAME: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^[A-Za-z0-9._]{1,30}$");

/// Path segments that look like usernames in URLs but are not profiles.
const RESERVED_PATHS: &[&str] = &["p", "reel", "reels", "tv", "explore", "stories", "accounts"];

const USER_ID_FIELDS: &[&str] = &["user_id", "pk", "id"];
const USER_ID_CONTAINERS: &[&str] = &["data", "user"];

/// Strategy order for follower / following / recommendation lists.
pub const USER_LIST_ORDER: &[ShapeStrategy] = &[
    ShapeStrategy::ArrayShape,
    ShapeStrategy::NestedDataItems,
    ShapeStrategy::NamedField("users"),
    ShapeStrategy::NamedField("following"),
    ShapeStrategy::NamedField("followers"),
    ShapeStrategy::NamedField("recommendations"),
    ShapeStrategy::NamedField("similar_accounts"),
    ShapeStrategy::NamedField("chaining"),
    ShapeStrategy::NamedField("items"),
    ShapeStrategy::EdgeNodeGraph,
];

/// Errors resolving a user reference to an id.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    /// The lookup succeeded but carried no id
    #[error("No user id found for username {0}")]
    UnknownUser(String),
}

/// A user as typed by someone in chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Id(String),
    Username(String),
}

impl UserRef {
    /// Parses a numeric id, `@name`, bare name or profile URL.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        if input.contains("instagram.com") {
            let name = RE_PROFILE_URL
                .captures(input)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())?;
            if RESERVED_PATHS.contains(&name) {
                return None;
            }
            return Some(Self::Username(name.to_string()));
        }

        let candidate = input.strip_prefix('@').unwrap_or(input);
        if candidate.chars().all(|c| c.is_ascii_digit()) {
            return Some(Self::Id(candidate.to_string()));
        }
        if RE_USERNAME.is_match(candidate) {
            return Some(Self::Username(candidate.to_string()));
        }
        None
    }
}

/// Resolves `user` to a numeric id.
///
/// Ids are returned as-is without a request. Usernames cost one lookup,
/// after which `governor` paces the caller's next upstream call.
///
/// # Errors
///
/// Returns [`ResolveError::Upstream`] if the lookup fails and
/// [`ResolveError::UnknownUser`] if the response has no id.
pub async fn resolve_user_id(
    client: &ScraperClient,
    user: &UserRef,
    governor: &RateGovernor,
) -> Result<String, ResolveError> {
    match user {
        UserRef::Id(id) => Ok(id.clone()),
        UserRef::Username(name) => {
            let raw = client.user_id_by_username(name).await?;
            let id = find_user_id(&raw).ok_or_else(|| ResolveError::UnknownUser(name.clone()))?;
            info!(username = %name, user_id = %id, "Resolved username");
            governor.wait_before_next_call().await;
            Ok(id)
        }
    }
}

/// Finds a user id at the top level or inside `data` / `user` (one or two levels deep).
#[must_use]
pub fn find_user_id(raw: &Value) -> Option<String> {
    if let Some(id) = scalar_string(raw) {
        return Some(id);
    }
    find_user_id_in(raw, 0)
}

fn find_user_id_in(value: &Value, depth: usize) -> Option<String> {
    if let Some(id) = USER_ID_FIELDS
        .iter()
        .find_map(|field| value.get(*field).and_then(scalar_string))
    {
        return Some(id);
    }
    if depth >= 2 {
        return None;
    }
    USER_ID_CONTAINERS
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| find_user_id_in(v, depth + 1)))
}

/// Extracts the shortcode from a post, reel or IGTV URL.
#[must_use]
pub fn post_shortcode(url: &str) -> Option<String> {
    RE_POST_URL
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Users listed in a following / followers / similar-accounts response.
///
/// Entries shaped `{ "user": { .. } }` are unwrapped.
#[must_use]
pub fn user_list(raw: &Value) -> Vec<Item> {
    extract_items_with(raw, USER_LIST_ORDER)
        .into_iter()
        .map(|entry| match entry.get("user") {
            Some(Value::Object(inner)) if entry.len() == 1 => inner.clone(),
            _ => entry,
        })
        .collect()
}

/// Kind of a relayable media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

/// A media file of a post, addressed by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUrl {
    pub kind: MediaKind,
    pub url: String,
}

/// Media files of a post response: one entry per carousel child, or one for
/// a single-media post. Videos win over their cover image.
#[must_use]
pub fn extract_media_urls(raw: &Value) -> Vec<MediaUrl> {
    let Some(post) = locate_post(raw) else {
        return Vec::new();
    };

    let children: Vec<&Item> = post
        .get("carousel_media")
        .and_then(Value::as_array)
        .map(|c| c.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default();

    let nodes = if children.is_empty() {
        vec![post]
    } else {
        children
    };

    let mut out: Vec<MediaUrl> = Vec::new();
    for media in nodes.into_iter().filter_map(media_of) {
        if !out.iter().any(|m| m.url == media.url) {
            out.push(media);
        }
    }
    debug!(count = out.len(), "Extracted media URLs");
    out
}

fn locate_post(raw: &Value) -> Option<&Item> {
    let obj = raw.as_object()?;
    if is_media_node(obj) {
        return Some(obj);
    }
    if let Some(data) = raw.get("data") {
        if let Some(post) = locate_post(data) {
            return Some(post);
        }
    }
    ["items", "media"]
        .iter()
        .filter_map(|key| raw.get(*key))
        .find_map(|v| match v {
            Value::Array(list) => list.first().and_then(Value::as_object),
            Value::Object(obj) => Some(obj),
            _ => None,
        })
        .filter(|obj| is_media_node(obj))
}

fn is_media_node(obj: &Item) -> bool {
    [
        "video_url",
        "video_versions",
        "image_url",
        "image_versions2",
        "carousel_media",
        "display_url",
    ]
    .iter()
    .any(|key| obj.contains_key(*key))
}

fn media_of(node: &Item) -> Option<MediaUrl> {
    let video = node
        .get("video_url")
        .and_then(Value::as_str)
        .map(String::from)
        .or_else(|| {
            node.get("video_versions")
                .and_then(Value::as_array)
                .and_then(|v| v.iter().find_map(|e| e.get("url")?.as_str()))
                .map(String::from)
        })
        .filter(|u| !u.is_empty());

    if let Some(url) = video {
        return Some(MediaUrl {
            kind: MediaKind::Video,
            url,
        });
    }

    primary_image_url(node).map(|url| MediaUrl {
        kind: MediaKind::Photo,
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_user_refs() {
        assert_eq!(UserRef::parse("25025320"), Some(UserRef::Id("25025320".into())));
        assert_eq!(
            UserRef::parse("@nat.geo"),
            Some(UserRef::Username("nat.geo".into()))
        );
        assert_eq!(
            UserRef::parse("https://www.instagram.com/nasa/?hl=en"),
            Some(UserRef::Username("nasa".into()))
        );
        assert_eq!(
            UserRef::parse("instagram.com/u/someone"),
            Some(UserRef::Username("someone".into()))
        );
        assert_eq!(UserRef::parse("https://instagram.com/p/Cx1AbC/"), None);
        assert_eq!(UserRef::parse("not a user"), None);
        assert_eq!(UserRef::parse("   "), None);
    }

    #[test]
    fn test_find_user_id_shapes() {
        assert_eq!(find_user_id(&json!({"user_id": 123})).as_deref(), Some("123"));
        assert_eq!(find_user_id(&json!("456")).as_deref(), Some("456"));
        assert_eq!(
            find_user_id(&json!({"data": {"user": {"pk": "789"}}})).as_deref(),
            Some("789")
        );
        assert_eq!(find_user_id(&json!({"status": "fail"})), None);
    }

    #[test]
    fn test_post_shortcode() {
        assert_eq!(
            post_shortcode("https://www.instagram.com/p/Cx1-AbC_d/").as_deref(),
            Some("Cx1-AbC_d")
        );
        assert_eq!(
            post_shortcode("https://instagram.com/reel/Dq9zz?igsh=x").as_deref(),
            Some("Dq9zz")
        );
        assert_eq!(
            post_shortcode("https://www.instagram.com/someone/reels/Abc/").as_deref(),
            Some("Abc")
        );
        assert_eq!(post_shortcode("https://www.instagram.com/nasa/"), None);
    }

    #[test]
    fn test_user_list_unwraps_user_entries() {
        let raw = json!({"users": [{"user": {"username": "a"}}, {"username": "b"}]});
        let users = user_list(&raw);
        let names: Vec<_> = users
            .iter()
            .filter_map(|u| u.get("username").and_then(Value::as_str))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_user_list_recommendation_fields() {
        let raw = json!({"chaining": [{"username": "c"}]});
        assert_eq!(user_list(&raw).len(), 1);
    }

    #[test]
    fn test_media_urls_single_video() {
        let raw = json!({"data": {
            "video_versions": [{"url": "https://cdn/v.mp4"}],
            "image_versions2": {"candidates": [{"url": "https://cdn/cover.jpg"}]}
        }});
        assert_eq!(
            extract_media_urls(&raw),
            vec![MediaUrl {
                kind: MediaKind::Video,
                url: "https://cdn/v.mp4".into()
            }]
        );
    }

    #[test]
    fn test_media_urls_carousel() {
        let raw = json!({"items": [{
            "carousel_media": [
                {"image_versions2": {"candidates": [{"url": "https://cdn/1.jpg"}]}},
                {"video_url": "https://cdn/2.mp4"},
                {"image_url": "https://cdn/1.jpg"}
            ]
        }]});
        let media = extract_media_urls(&raw);
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].kind, MediaKind::Photo);
        assert_eq!(media[1].kind, MediaKind::Video);
    }

    #[test]
    fn test_media_urls_missing() {
        assert!(extract_media_urls(&json!({"status": "ok"})).is_empty());
        assert!(extract_media_urls(&json!([])).is_empty());
    }
}
