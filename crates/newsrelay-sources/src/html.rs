//! Extraction of notifications from portal listing markup.
//!
//! Listing structure:
//! ```text
//! <div id="div_lstThongBao">
//!   <div class="list-item">
//!     <a class="title" title="Exam schedule">...</a>
//!     <a class="link-detail" onclick="location.href='/ThongBao/Detail/123'">...</a>
//!   </div>
//!   ...
//! ```

use std::sync::LazyLock;

use newsrelay_core::error::FetchError;
use newsrelay_core::types::NotificationItem;
use regex::Regex;

/// Id of the element wrapping the notification list.
pub const LISTING_CONTAINER: &str = "div_lstThongBao";

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| class_tag("list-item"));
static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| class_tag("title"));
static DETAIL_TAG: LazyLock<Regex> =
    LazyLock::new(|| class_tag("link-detail"));
static DETAIL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Detail/(\d+)").expect("static regex"));
static INPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("static regex"));
static ATTR_TITLE: LazyLock<Regex> = LazyLock::new(|| attr_pattern("title"));
static ATTR_NAME: LazyLock<Regex> = LazyLock::new(|| attr_pattern("name"));
static ATTR_TYPE: LazyLock<Regex> = LazyLock::new(|| attr_pattern("type"));
static ATTR_VALUE: LazyLock<Regex> = LazyLock::new(|| attr_pattern("value"));
static ATTR_ID: LazyLock<Regex> = LazyLock::new(|| attr_pattern("id"));
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos|nbsp);").expect("static regex"));

/// Opening tag carrying `class` among its classes.
fn class_tag(class: &str) -> Regex {
    let pattern = format!(
        r#"(?is)<[a-z][a-z0-9]*\b[^>]*\bclass\s*=\s*"(?:[^"]*\s)?{}(?:\s[^"]*)?"[^>]*>"#,
        regex::escape(class)
    );
    Regex::new(&pattern).expect("static regex")
}

/// Matches `name="..."` inside a tag.
fn attr_pattern(name: &str) -> Regex {
    let pattern = format!(r#"(?is)(?:^|\s){}\s*=\s*"([^"]*)""#, regex::escape(name));
    Regex::new(&pattern).expect("static regex")
}

/// Value of attribute `name` inside a single tag.
pub fn attr(tag: &str, name: &str) -> Option<String> {
    let owned;
    let re: &Regex = match name {
        "title" => &*ATTR_TITLE,
        "name" => &*ATTR_NAME,
        "type" => &*ATTR_TYPE,
        "value" => &*ATTR_VALUE,
        "id" => &*ATTR_ID,
        other => {
            owned = attr_pattern(other);
            &owned
        }
    };
    re.captures(tag).map(|c| decode_entities(&c[1]))
}

/// Whether the page contains the notification list at all.
pub fn has_listing(html: &str) -> bool {
    html.contains(&format!("id=\"{LISTING_CONTAINER}\""))
}

/// Parse every notification on a listing page, in page order.
///
/// Items without a detail id are skipped. `detail_url` must contain `{id}`.
pub fn parse_listing(html: &str, detail_url: &str) -> Result<Vec<NotificationItem>, FetchError> {
    if !has_listing(html) {
        return Err(FetchError::Parse(format!("listing container '{LISTING_CONTAINER}' not found")));
    }

    let starts: Vec<usize> = LIST_ITEM.find_iter(html).map(|m| m.start()).collect();
    let mut items = Vec::with_capacity(starts.len());

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(html.len());
        let block = &html[start..end];

        let Some(id) = DETAIL_TAG
            .find(block)
            .and_then(|tag| DETAIL_ID.captures(tag.as_str()))
            .map(|c| c[1].to_string())
        else {
            tracing::debug!("Skipping list item without a detail id");
            continue;
        };
        let title = TITLE_TAG
            .find(block)
            .and_then(|tag| attr(tag.as_str(), "title"))
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        items.push(NotificationItem {
            detail_ref: detail_url.replace("{id}", &id),
            id,
            title,
        });
    }

    Ok(items)
}

/// Hidden form fields (`name`, `value`) to echo back on login.
pub fn hidden_inputs(html: &str) -> Vec<(String, String)> {
    INPUT_TAG
        .find_iter(html)
        .map(|m| m.as_str())
        .filter(|tag| attr(tag, "type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")))
        .filter_map(|tag| Some((attr(tag, "name")?, attr(tag, "value").unwrap_or_default())))
        .collect()
}

/// Whether the page still shows an input named `field` (login form not left).
pub fn has_input(html: &str, field: &str) -> bool {
    INPUT_TAG.find_iter(html).any(|m| {
        let tag = m.as_str();
        attr(tag, "name").as_deref() == Some(field) || attr(tag, "id").as_deref() == Some(field)
    })
}

/// Decode the HTML entities that appear in attribute values.
pub fn decode_entities(s: &str) -> String {
    ENTITY
        .replace_all(s, |caps: &regex::Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if name.starts_with("#x") || name.starts_with("#X") => {
                    u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
                }
                _ => name[1..].parse::<u32>().ok().and_then(char::from_u32),
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
