//! Core data types for cebaf-graph
//!
//! This module contains the records shared by the fetch, classification and
//! output stages.
//!
//! # Main Types
//!
//! - [`Element`] - An accelerator element as returned by the inventory service
//! - [`Interval`] - A sampling step such as `1h` or `15m`
//! - [`DateSpan`] - A begin/end/interval sampling window
//! - [`SampleRow`] - Channel values sampled at one timestamp
//!
//! # Timestamps
//!
//! Timestamps are wall-clock times in the archiver's timezone and are kept
//! naive; the sampler attaches the configured timezone whenever it needs to
//! do calendar arithmetic.

use crate::error::{GraphError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Value recorded for a channel that the archiver had no data for
pub const UNDEFINED: &str = "<undefined>";

/// Property holding the EPICS base name of an element
pub const EPICS_NAME_PROPERTY: &str = "EPICSName";

/// Timestamp format used in replay files and archiver responses
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Timestamp format used in archiver request parameters
pub const REQUEST_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ACCEPTED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp in any of the forms used by config files and services.
///
/// A bare date is taken as midnight.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    for format in ACCEPTED_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| GraphError::DateSpan(format!("Unrecognized timestamp '{}'", text)))
}

/// Serde helpers for timestamps in [`TIMESTAMP_FORMAT`]
pub mod timestamp_format {
    use super::*;

    pub fn serialize<S: Serializer>(
        ts: &NaiveDateTime,
        s: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(d)?;
        parse_timestamp(&text).map_err(serde::de::Error::custom)
    }
}

// ==================== Element ====================

/// One accelerator component returned by the inventory service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Element name (e.g. `MQD0R05`)
    pub name: String,

    /// Inventory type name (e.g. `QD`)
    #[serde(rename = "type")]
    pub type_name: String,

    /// Requested properties
    #[serde(default, deserialize_with = "deserialize_string_map")]
    pub properties: BTreeMap<String, String>,
}

impl Element {
    /// Create an element without properties
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Base name used to build channel names.
    ///
    /// The `EPICSName` property when present, otherwise the element name.
    pub fn epics_name(&self) -> &str {
        self.properties
            .get(EPICS_NAME_PROPERTY)
            .filter(|n| !n.is_empty())
            .map(String::as_str)
            .unwrap_or(&self.name)
    }
}

// ==================== Interval ====================

/// A sampling interval, keeping the text the archiver expects alongside
/// its parsed length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    text: String,
    duration: Duration,
}

impl Interval {
    /// Parse an interval such as `1h`, `4h`, `15m` or `1s`
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let duration = humantime::parse_duration(text)
            .map_err(|e| GraphError::DateSpan(format!("Invalid interval '{}': {}", text, e)))?;
        if duration.is_zero() {
            return Err(GraphError::DateSpan(format!("Interval '{}' is zero", text)));
        }
        Ok(Self {
            text: text.to_string(),
            duration,
        })
    }

    /// The interval as written in the config
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length of one step
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self {
            text: "1h".to_string(),
            duration: Duration::from_secs(3600),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        Interval::parse(&text).map_err(serde::de::Error::custom)
    }
}

// ==================== DateSpan ====================

/// A sampling window. `begin == end` denotes a single instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    #[serde(with = "timestamp_format")]
    begin: NaiveDateTime,
    #[serde(with = "timestamp_format")]
    end: NaiveDateTime,
    interval: Interval,
}

impl DateSpan {
    /// Create a span, rejecting an end before the begin
    pub fn new(begin: NaiveDateTime, end: NaiveDateTime, interval: Interval) -> Result<Self> {
        if end < begin {
            return Err(GraphError::DateSpan(format!(
                "End {} is before begin {}",
                end, begin
            )));
        }
        Ok(Self {
            begin,
            end,
            interval,
        })
    }

    /// Parse a span from config strings
    pub fn parse(begin: &str, end: &str, interval: &str) -> Result<Self> {
        Self::new(
            parse_timestamp(begin)?,
            parse_timestamp(end)?,
            Interval::parse(interval)?,
        )
    }

    /// A single-instant span
    pub fn instant(at: NaiveDateTime) -> Self {
        Self {
            begin: at,
            end: at,
            interval: Interval {
                text: "1s".to_string(),
                duration: Duration::from_secs(1),
            },
        }
    }

    pub fn begin(&self) -> NaiveDateTime {
        self.begin
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Whether this span denotes one instant
    pub fn is_instant(&self) -> bool {
        self.begin == self.end
    }
}

#[derive(Deserialize)]
struct RawDateSpan {
    begin: Option<String>,
    end: Option<String>,
    interval: Option<String>,
}

impl<'de> Deserialize<'de> for DateSpan {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = RawDateSpan::deserialize(d)?;
        let begin = raw
            .begin
            .ok_or_else(|| serde::de::Error::custom("date span is missing 'begin'"))?;
        let end = raw.end.unwrap_or_else(|| begin.clone());
        let interval = raw.interval.unwrap_or_else(|| "1h".to_string());
        DateSpan::parse(&begin, &end, &interval).map_err(serde::de::Error::custom)
    }
}

// ==================== SampleRow ====================

/// Channel values sampled at one timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRow {
    #[serde(rename = "date", with = "timestamp_format")]
    pub timestamp: NaiveDateTime,

    #[serde(deserialize_with = "deserialize_channel_values")]
    pub values: BTreeMap<String, String>,
}

impl SampleRow {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Value of a channel, or [`UNDEFINED`] if the row has none
    pub fn value(&self, channel: &str) -> &str {
        self.values
            .get(channel)
            .map(String::as_str)
            .unwrap_or(UNDEFINED)
    }
}

/// Render a JSON scalar the way the archiver spells it
fn scalar_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => UNDEFINED.to_string(),
        other => other.to_string(),
    }
}

/// The two shapes the archiver uses for the values of one row
#[derive(Deserialize)]
#[serde(untagged)]
enum RawChannelValues {
    List(Vec<serde_json::Map<String, serde_json::Value>>),
    Map(serde_json::Map<String, serde_json::Value>),
}

fn deserialize_channel_values<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error> {
    let entries: Vec<(String, serde_json::Value)> = match RawChannelValues::deserialize(d)? {
        RawChannelValues::List(items) => items.into_iter().flatten().collect(),
        RawChannelValues::Map(map) => map.into_iter().collect(),
    };
    Ok(entries
        .into_iter()
        .map(|(k, v)| (k, scalar_to_string(v)))
        .collect())
}

fn deserialize_string_map<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error> {
    let map = Option::<serde_json::Map<String, serde_json::Value>>::deserialize(d)?;
    Ok(map
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, scalar_to_string(v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_forms() {
        let midnight = parse_timestamp("2001-11-1").unwrap();
        assert_eq!(midnight.to_string(), "2001-11-01 00:00:00");
        let hour = parse_timestamp("2001-11-01 23:00").unwrap();
        assert_eq!(hour.to_string(), "2001-11-01 23:00:00");
        let iso = parse_timestamp("2021-11-10T01:00:00").unwrap();
        assert_eq!(iso.to_string(), "2021-11-10 01:00:00");
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_epics_name_fallback() {
        let plain = Element::new("MQD0R05", "QD");
        assert_eq!(plain.epics_name(), "MQD0R05");

        let named = Element::new("R123", "CryoCavity").with_property("EPICSName", "R1M1");
        assert_eq!(named.epics_name(), "R1M1");
    }

    #[test]
    fn test_span_rejects_end_before_begin() {
        let err = DateSpan::parse("2021-10-02", "2021-10-01", "1h").unwrap_err();
        assert!(matches!(err, GraphError::DateSpan(_)));
    }

    #[test]
    fn test_span_missing_begin_is_rejected() {
        let result: std::result::Result<DateSpan, _> =
            serde_json::from_str(r#"{"end": "2021-10-01"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_interval_parse() {
        let interval = Interval::parse("4h").unwrap();
        assert_eq!(interval.duration(), Duration::from_secs(4 * 3600));
        assert_eq!(interval.as_str(), "4h");
        assert!(Interval::parse("0s").is_err());
        assert!(Interval::parse("often").is_err());
    }

    #[test]
    fn test_sample_row_accepts_both_value_shapes() {
        let listed: SampleRow = serde_json::from_str(
            r#"{"date":"2021-11-10T00:00:00",
                "values":[{"MQB0L09.BDL":"405.921"},{"MQB0L10.BDL":317.829}]}"#,
        )
        .unwrap();
        let mapped: SampleRow = serde_json::from_str(
            r#"{"date":"2021-11-10 00:00:00",
                "values":{"MQB0L09.BDL":"405.921","MQB0L10.BDL":"317.829"}}"#,
        )
        .unwrap();
        assert_eq!(listed, mapped);
        assert_eq!(listed.value("MQB0L10.BDL"), "317.829");
        assert_eq!(listed.value("MISSING"), UNDEFINED);
    }
}
