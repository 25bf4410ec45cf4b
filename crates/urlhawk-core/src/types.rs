//! Core result types shared by the engine and its consumers.
//!
//! A scan produces one [`Outcome`] per probe; the [`ScanResult`] collects them
//! under the probe names together with the normalized target.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::target::Target;

/// Key reserved for the normalized target in a serialized [`ScanResult`].
pub const URL_KEY: &str = "url";

// ── Outcome ───────────────────────────────────────────────────────

/// A single value in a [`Outcome::KeyValueMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// The tagged result of one probe run.
///
/// Serializes as the shape the web UI consumes: `[]` for `Empty`, an array
/// for `StringList`, an object for `KeyValueMap`, and `{"error": "..."}` for
/// `ErrorMarker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The probe found nothing notable.
    Empty,
    /// Ordered findings, e.g. missing header names.
    StringList(Vec<String>),
    /// Human-readable fields, e.g. certificate subject and issuer.
    KeyValueMap(BTreeMap<String, FieldValue>),
    /// The probe failed, timed out, or crashed.
    ErrorMarker { message: String },
}

impl Outcome {
    /// A list outcome, collapsing to `Empty` when there are no findings.
    pub fn list(items: Vec<String>) -> Self {
        if items.is_empty() {
            Self::Empty
        } else {
            Self::StringList(items)
        }
    }

    /// A mapping outcome, collapsing to `Empty` when there are no fields.
    pub fn map<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields: BTreeMap<String, FieldValue> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if fields.is_empty() {
            Self::Empty
        } else {
            Self::KeyValueMap(fields)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::ErrorMarker {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::ErrorMarker { .. })
    }

    /// Error message, if this is an `ErrorMarker`.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::ErrorMarker { message } => Some(message),
            _ => None,
        }
    }

    /// Findings, if this is a `StringList`.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::StringList(items) => Some(items),
            _ => None,
        }
    }

    /// Fields, if this is a `KeyValueMap`.
    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            Self::KeyValueMap(fields) => Some(fields),
            _ => None,
        }
    }

    /// Short name of the variant, used in log fields.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::StringList(_) => "list",
            Self::KeyValueMap(_) => "map",
            Self::ErrorMarker { .. } => "error",
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.collect_seq(std::iter::empty::<&str>()),
            Self::StringList(items) => items.serialize(serializer),
            Self::KeyValueMap(fields) => fields.serialize(serializer),
            Self::ErrorMarker { message } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", message)?;
                map.end()
            }
        }
    }
}

// ── Scan result ───────────────────────────────────────────────────

/// Aggregated outcome of one scan: one entry per registered probe plus the
/// normalized target under [`URL_KEY`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub url: Target,
    pub outcomes: BTreeMap<String, Outcome>,
}

impl ScanResult {
    pub fn new(url: Target, outcomes: BTreeMap<String, Outcome>) -> Self {
        Self { url, outcomes }
    }

    pub fn get(&self, probe: &str) -> Option<&Outcome> {
        self.outcomes.get(probe)
    }

    /// Number of probe entries, excluding the target URL.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.outcomes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_error()).count()
    }
}

impl Serialize for ScanResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.outcomes.len() + 1))?;
        map.serialize_entry(URL_KEY, &self.url)?;
        for (name, outcome) in &self.outcomes {
            map.serialize_entry(name, outcome)?;
        }
        map.end()
    }
}

/// Public description of a registered probe.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProbeInfo {
    pub name: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::normalize;
    use serde_json::json;

    #[test]
    fn test_outcome_serialization_shapes() {
        assert_eq!(serde_json::to_value(Outcome::Empty).unwrap(), json!([]));
        assert_eq!(
            serde_json::to_value(Outcome::list(vec!["/.env".into()])).unwrap(),
            json!(["/.env"])
        );
        assert_eq!(
            serde_json::to_value(Outcome::error("Invalid domain")).unwrap(),
            json!({"error": "Invalid domain"})
        );

        let map = Outcome::map([
            ("Registrar", FieldValue::from("Example Registrar")),
            ("Status", FieldValue::from(vec!["active".to_string()])),
        ]);
        assert_eq!(
            serde_json::to_value(map).unwrap(),
            json!({"Registrar": "Example Registrar", "Status": ["active"]})
        );
    }

    #[test]
    fn test_empty_collections_collapse_to_empty() {
        assert_eq!(Outcome::list(Vec::new()), Outcome::Empty);
        assert_eq!(Outcome::map(Vec::<(String, String)>::new()), Outcome::Empty);
    }

    #[test]
    fn test_scan_result_injects_url() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert("missing_headers".to_string(), Outcome::Empty);
        outcomes.insert("open_ports".to_string(), Outcome::error("timed out"));
        let result = ScanResult::new(normalize("example.com/"), outcomes);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["url"], json!("http://example.com"));
        assert_eq!(value["missing_headers"], json!([]));
        assert_eq!(value["open_ports"], json!({"error": "timed out"}));
        assert_eq!(value.as_object().unwrap().len(), 3);
        assert_eq!(result.error_count(), 1);
    }

    #[test]
    fn test_field_value_display_joins_lists() {
        let v = FieldValue::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(v.to_string(), "a, b");
    }
}
