//! Plain HTML summaries of profiles, user lists and feeds.
//!
//! Every tag opens and closes on the same line so replies can be split on
//! line boundaries.

use html_escape::encode_text;
use serde_json::Value;

use crate::config::REPLY_LIST_LIMIT;
use crate::feed::fingerprint::caption_text;
use crate::feed::normalize::scalar_string;
use crate::feed::{Aggregated, FeedKind, Item, StopReason};
use crate::utils::ellipsize;

const CAPTION_PREVIEW_CHARS: usize = 80;
const BIO_PREVIEW_CHARS: usize = 300;

/// Welcome text for `/start` and `/help`.
#[must_use]
pub fn help_text(commands: &str) -> String {
    format!(
        "👋 <b>Feed relay</b>\n\
         Pass a username, @name, numeric id or profile link.\n\n{}",
        encode_text(commands)
    )
}

/// Profile card for `/userinfo`.
#[must_use]
pub fn format_profile(raw: &Value) -> String {
    let user = locate_user(raw);
    let field = |key: &str| user.get(key).and_then(scalar_string);
    let count = |keys: &[&str]| {
        keys.iter().find_map(|key| match user.get(*key) {
            Some(Value::Object(edge)) => edge.get("count").and_then(scalar_string),
            Some(v) => scalar_string(v),
            None => None,
        })
    };

    let mut lines = Vec::new();
    let username = field("username").unwrap_or_else(|| "unknown".to_string());
    let mut title = format!("👤 <b>@{}</b>", encode_text(&username));
    if user.get("is_verified").and_then(Value::as_bool) == Some(true) {
        title.push_str(" ✔️");
    }
    if user.get("is_private").and_then(Value::as_bool) == Some(true) {
        title.push_str(" 🔒");
    }
    lines.push(title);

    if let Some(name) = field("full_name") {
        lines.push(encode_text(&name).into_owned());
    }
    if let Some(id) = field("pk").or_else(|| field("id")) {
        lines.push(format!("ID: <code>{}</code>", encode_text(&id)));
    }
    for (label, keys) in [
        ("Posts", &["media_count", "edge_owner_to_timeline_media"][..]),
        ("Followers", &["follower_count", "edge_followed_by"][..]),
        ("Following", &["following_count", "edge_follow"][..]),
    ] {
        if let Some(n) = count(keys) {
            lines.push(format!("{label}: {n}"));
        }
    }
    if let Some(bio) = field("biography") {
        let bio = ellipsize(&bio.replace('\n', " "), BIO_PREVIEW_CHARS);
        lines.push(format!("\n{}", encode_text(&bio)));
    }
    lines.join("\n")
}

fn locate_user(raw: &Value) -> &Value {
    for path in [&["data", "user"][..], &["user"][..], &["data"][..]] {
        let found = path.iter().try_fold(raw, |v, key| v.get(*key));
        if let Some(v) = found.filter(|v| v.is_object()) {
            return v;
        }
    }
    raw
}

/// Numbered list of users, capped at [`REPLY_LIST_LIMIT`] entries.
#[must_use]
pub fn format_user_list(title: &str, users: &[Item]) -> String {
    if users.is_empty() {
        return format!("<b>{}</b>: nobody found.", encode_text(title));
    }

    let mut lines = vec![format!("<b>{}</b> ({})", encode_text(title), users.len())];
    for (i, user) in users.iter().take(REPLY_LIST_LIMIT).enumerate() {
        let username = user
            .get("username")
            .and_then(scalar_string)
            .unwrap_or_else(|| "?".to_string());
        let mut line = format!("{}. @{}", i + 1, encode_text(&username));
        if let Some(name) = user.get("full_name").and_then(scalar_string) {
            line.push_str(&format!(" · {}", encode_text(&name)));
        }
        lines.push(line);
    }
    push_remainder(&mut lines, users.len());
    lines.join("\n")
}

/// Summary of an aggregation run, capped at [`REPLY_LIST_LIMIT`] entries.
#[must_use]
pub fn format_feed(kind: FeedKind, owner: &str, result: &Aggregated) -> String {
    let mut lines = vec![format!(
        "<b>{} {} of {}</b> ({} pages, {})",
        result.items.len(),
        kind.label(),
        encode_text(owner),
        result.pages_fetched,
        stop_reason_label(result.stop_reason)
    )];

    for (i, item) in result.items.iter().take(REPLY_LIST_LIMIT).enumerate() {
        let caption = caption_text(item)
            .map(|c| ellipsize(&c.replace('\n', " "), CAPTION_PREVIEW_CHARS))
            .unwrap_or_else(|| "(no caption)".to_string());
        let mut line = format!("{}. {}", i + 1, encode_text(&caption));
        if let Some(link) = item_link(item) {
            line.push_str(&format!(" <a href=\"{link}\">open</a>"));
        }
        lines.push(line);
    }
    push_remainder(&mut lines, result.items.len());
    lines.join("\n")
}

fn push_remainder(lines: &mut Vec<String>, total: usize) {
    if total > REPLY_LIST_LIMIT {
        lines.push(format!("… and {} more", total - REPLY_LIST_LIMIT));
    }
}

/// Public post link built from the item's shortcode.
#[must_use]
pub fn item_link(item: &Item) -> Option<String> {
    let code = item.get("code").or_else(|| item.get("shortcode"))?;
    let code = scalar_string(code)?;
    code.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        .then(|| format!("https://www.instagram.com/p/{code}/"))
}

#[must_use]
pub const fn stop_reason_label(reason: StopReason) -> &'static str {
    match reason {
        StopReason::NoNewItems => "no new content",
        StopReason::ItemLimit => "limit reached",
        StopReason::EndOfStream => "end of feed",
        StopReason::PageLimit => "page limit reached",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(values: Vec<Value>) -> Vec<Item> {
        values
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect()
    }

    #[test]
    fn test_format_profile_escapes_and_counts() {
        let raw = json!({"data": {"user": {
            "username": "a<b",
            "full_name": "Full & Name",
            "pk": 42,
            "is_verified": true,
            "edge_followed_by": {"count": 1000},
            "following_count": 7
        }}});
        let text = format_profile(&raw);
        assert!(text.contains("@a&lt;b"));
        assert!(text.contains("Full &amp; Name"));
        assert!(text.contains("ID: <code>42</code>"));
        assert!(text.contains("Followers: 1000"));
        assert!(text.contains("Following: 7"));
        assert!(text.contains("✔️"));
    }

    #[test]
    fn test_format_user_list_caps_entries() {
        let users = items(
            (0..25)
                .map(|i| json!({"username": format!("user{i}")}))
                .collect(),
        );
        let text = format_user_list("Followers", &users);
        assert!(text.starts_with("<b>Followers</b> (25)"));
        assert!(text.contains("20. @user19"));
        assert!(!text.contains("@user20"));
        assert!(text.ends_with("… and 5 more"));
    }

    #[test]
    fn test_format_user_list_empty() {
        assert_eq!(
            format_user_list("Similar", &[]),
            "<b>Similar</b>: nobody found."
        );
    }

    #[test]
    fn test_format_feed() {
        let result = Aggregated {
            items: items(vec![
                json!({"caption": {"text": "hello\nworld"}, "code": "Abc_1"}),
                json!({"id": "2"}),
            ]),
            last_cursor: None,
            pages_fetched: 1,
            stop_reason: StopReason::EndOfStream,
        };
        let text = format_feed(FeedKind::Posts, "@nasa", &result);
        assert!(text.starts_with("<b>2 posts of @nasa</b> (1 pages, end of feed)"));
        assert!(text.contains(
            "1. hello world <a href=\"https://www.instagram.com/p/Abc_1/\">open</a>"
        ));
        assert!(text.contains("2. (no caption)"));
    }

    #[test]
    fn test_item_link_rejects_odd_codes() {
        let item = items(vec![json!({"code": "x\" onclick=\"y"})]);
        assert_eq!(item_link(&item[0]), None);
    }
}
