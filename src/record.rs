//! Scraped records and the common export schema.

use std::fmt;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Columns every export starts with, in order.
pub const COLUMNS: &[&str] = &[
    "File",
    "Last Name",
    "First Name",
    "Street Address 1",
    "Street Address 2",
    "City",
    "State",
    "Zip Code",
    "Phone",
    "Email",
    "License Number",
    "License Status",
    "Company Domain",
    "Company",
];

/// Key under which targets store the detail-page URL of a record.
pub const HREF: &str = "href";

/// Fields scraped from a list row, extended by the detail page.
///
/// Keys keep their insertion order so cache files read the same way the
/// portal presents them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawRecord(IndexMap<String, String>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record by pairing `keys` with `values` positionally.
    ///
    /// Extra values are ignored; missing values leave their keys absent.
    pub fn zip<I, S>(keys: &[&str], values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut record = Self::new();
        for (key, value) in keys.iter().zip(values) {
            record.insert(*key, value);
        }
        record
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value for `key`, or the empty string when absent.
    pub fn field(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// First non-empty value among `keys`, or "".
    pub fn first_of(&self, keys: &[&str]) -> &str {
        keys.iter()
            .map(|k| self.field(k))
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Merge `other` into `self` without overwriting fields already present.
    ///
    /// Identity fields come from the list row, so keeping them untouched keeps
    /// the record's key stable across reloads.
    pub fn merge_missing(&mut self, other: RawRecord) {
        self.merge_detail(other, &[]);
    }

    /// Like [`merge_missing`](Self::merge_missing), except that the fields
    /// named in `overriding` take `other`'s value when it is non-empty.
    pub fn merge_detail(&mut self, other: RawRecord, overriding: &[&str]) {
        for (key, value) in other.0 {
            if overriding.contains(&key.as_str()) && !value.is_empty() {
                self.0.insert(key, value);
            } else {
                self.0.entry(key).or_insert(value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build a record from a JSON object, stringifying scalar values.
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(
            object
                .into_iter()
                .map(|(k, v)| (k, json_to_text(v)))
                .collect(),
        )
    }
}

fn json_to_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

// Older cache files carry `null` for fields that were never filled, and JSON
// APIs hand back numbers; both load as text.
impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(Self::from_json_object(object))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The tuple of field values a target uses to recognise a record it has
/// already scraped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(Vec<String>);

impl IdentityKey {
    /// Key made of `fields` in order; absent fields contribute "".
    pub fn from_fields(record: &RawRecord, fields: &[&str]) -> Self {
        Self(
            fields
                .iter()
                .map(|f| record.field(f).to_string())
                .collect(),
        )
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" | "))
    }
}

/// A record mapped onto [`COLUMNS`] plus a target's extra columns.
///
/// Every column exists from construction on, so a formatter that never
/// touches a column still yields an empty cell for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    columns: IndexMap<String, String>,
}

impl NormalizedRecord {
    pub fn new(extra_columns: &[&str]) -> Self {
        let columns = COLUMNS
            .iter()
            .chain(extra_columns)
            .map(|c| (c.to_string(), String::new()))
            .collect();
        Self { columns }
    }

    /// Set a column. Columns outside the schema are appended after it.
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        let value = value.into();
        match self.columns.get_mut(column) {
            Some(slot) => *slot = value,
            None => {
                tracing::debug!(column, "column outside declared schema");
                self.columns.insert(column.to_string(), value);
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Cell values laid out in the order of `header`.
    pub fn row<'a>(&'a self, header: &'a [String]) -> impl Iterator<Item = &'a str> + 'a {
        header
            .iter()
            .map(|column| self.get(column).unwrap_or_default())
    }
}

/// "Active" or "Expired" for an ISO (`YYYY-MM-DD`) expiration date relative
/// to `today`, `None` when the date does not parse.
pub fn status_from_expiration(expiration: &str, today: NaiveDate) -> Option<&'static str> {
    let date = NaiveDate::parse_from_str(expiration.trim(), "%Y-%m-%d").ok()?;
    Some(if date < today { "Expired" } else { "Active" })
}
