use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Logical identity of a row, stable across temp→real id promotion.
///
/// Locally created rows carry a `temp-<n>` key until the remote assigns a
/// permanent id; promotion rewrites the key everywhere in one step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(String);

impl RowKey {
    pub fn new(key: impl Into<String>) -> Self {
        RowKey(key.into())
    }

    /// Key for a locally created row that has no remote id yet.
    pub fn temp(n: u64) -> Self {
        RowKey(format!("temp-{}", n))
    }

    pub fn is_temp(&self) -> bool {
        self.0.starts_with("temp-")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowKey {
    fn from(s: &str) -> Self {
        RowKey(s.to_string())
    }
}

/// Field payload of a row. Opaque to the sync core; the UI and the remote
/// sources agree on its meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFields {
    pub title: String,
    /// Display state label (e.g. "todo", "In Progress").
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Display time like "14:30", if the row has one.
    #[serde(default)]
    pub due_time: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub abandoned: bool,
}

impl RowFields {
    pub fn titled(title: impl Into<String>) -> Self {
        RowFields {
            title: title.into(),
            ..Default::default()
        }
    }

    /// True if the row is overdue relative to `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date.is_some_and(|d| d < today)
    }

    /// First link associated with this row: explicit url field, then a link
    /// found in the title, then one in the note.
    pub fn link(&self) -> Option<String> {
        if let Some(url) = &self.url
            && !url.is_empty()
        {
            return Some(url.clone());
        }
        extract_url(&self.title).or_else(|| self.note.as_deref().and_then(extract_url))
    }
}

/// One displayed record in an optimistic collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub key: RowKey,
    /// Remote identifier, absent until the remote has confirmed creation.
    pub remote_id: Option<String>,
    /// Partition within which `order` is meaningful (e.g. a status column).
    pub group: String,
    /// Fractional in-group order key; strictly increasing in display order.
    pub order: f64,
    pub fields: RowFields,
    /// True while a remote mutation for this row is in flight.
    #[serde(default)]
    pub pending: bool,
}

impl Row {
    pub fn new(key: RowKey, group: impl Into<String>, order: f64, fields: RowFields) -> Self {
        Row {
            key,
            remote_id: None,
            group: group.into(),
            order,
            fields,
            pending: false,
        }
    }
}

/// Extract a URL from text, preferring markdown `[text](url)` targets.
pub fn extract_url(text: &str) -> Option<String> {
    static MARKDOWN: OnceLock<Regex> = OnceLock::new();
    static BARE: OnceLock<Regex> = OnceLock::new();
    let markdown =
        MARKDOWN.get_or_init(|| Regex::new(r"\[[^\]]*\]\((https?://[^)]+)\)").unwrap());
    if let Some(cap) = markdown.captures(text) {
        return Some(cap[1].to_string());
    }
    let bare = BARE.get_or_init(|| Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).unwrap());
    bare.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    // ── RowKey ─────────────────────────────────────────────────────

    #[test]
    fn temp_keys_are_temp() {
        assert!(RowKey::temp(1).is_temp());
        assert_eq!(RowKey::temp(7).as_str(), "temp-7");
    }

    #[test]
    fn remote_keys_are_not_temp() {
        assert!(!RowKey::new("8421").is_temp());
    }

    // ── overdue ────────────────────────────────────────────────────

    #[test]
    fn overdue_before_today() {
        let mut f = RowFields::titled("pay invoice");
        f.due_date = Some(date("2025-06-01"));
        assert!(f.is_overdue(date("2025-06-02")));
        assert!(!f.is_overdue(date("2025-06-01")));
    }

    #[test]
    fn no_due_date_never_overdue() {
        let f = RowFields::titled("someday");
        assert!(!f.is_overdue(date("2025-06-02")));
    }

    // ── link extraction ────────────────────────────────────────────

    #[test]
    fn markdown_link_wins_over_bare() {
        let url = extract_url("[docs](https://example.com/a) https://example.com/b");
        assert_eq!(url.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn bare_url_found() {
        let url = extract_url("see https://example.com/page?x=1 for details");
        assert_eq!(url.as_deref(), Some("https://example.com/page?x=1"));
    }

    #[test]
    fn no_url_is_none() {
        assert!(extract_url("nothing linked here").is_none());
    }

    #[test]
    fn explicit_url_field_preferred() {
        let mut f = RowFields::titled("see https://example.com/inline");
        f.url = Some("https://example.com/field".into());
        assert_eq!(f.link().as_deref(), Some("https://example.com/field"));
    }

    #[test]
    fn link_falls_back_to_note() {
        let mut f = RowFields::titled("plain title");
        f.note = Some("context: https://example.com/note".into());
        assert_eq!(f.link().as_deref(), Some("https://example.com/note"));
    }
}
