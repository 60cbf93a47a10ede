//! Prediction records and the values derived from them.

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Probability above which a record is classified positive.
pub const POSITIVE_THRESHOLD: f64 = 0.5;

/// Timestamp format used at every text boundary (SQLite, report, CLI).
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Store-assigned record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Positive,
    Negative,
}

impl Classification {
    pub fn from_probability(probability: f64) -> Self {
        if probability > POSITIVE_THRESHOLD {
            Classification::Positive
        } else {
            Classification::Negative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Positive => "positive",
            Classification::Negative => "negative",
        }
    }

    /// Operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Positive => "Signs detected",
            Classification::Negative => "Normal result",
        }
    }
}

/// One completed analysis.
///
/// `probability` is fixed at construction; only `feedback` changes afterwards.
/// The classification is derived on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub subject_label: String,
    probability: f64,
    pub recorded_at: NaiveDateTime,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl PredictionRecord {
    pub fn new(subject_label: impl Into<String>, probability: f64, recorded_at: NaiveDateTime) -> Self {
        Self {
            id: None,
            subject_label: subject_label.into(),
            probability,
            recorded_at: truncate_to_seconds(recorded_at),
            feedback: None,
        }
    }

    /// Record stamped with the operator's local clock.
    pub fn now(subject_label: impl Into<String>, probability: f64) -> Self {
        Self::new(subject_label, probability, Local::now().naive_local())
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_feedback(mut self, feedback: Option<String>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn classification(&self) -> Classification {
        Classification::from_probability(self.probability)
    }

    pub fn is_positive(&self) -> bool {
        self.classification() == Classification::Positive
    }

    /// Probability of the label the model gave: `p` when positive, `1 - p` otherwise.
    pub fn confidence(&self) -> f64 {
        match self.classification() {
            Classification::Positive => self.probability,
            Classification::Negative => 1.0 - self.probability,
        }
    }

    pub fn recorded_at_text(&self) -> String {
        self.recorded_at.format(TS_FORMAT).to_string()
    }

    /// RFC 3339 with the local UTC offset, for stores that keep `timestamptz`.
    /// A wall-clock time skipped by a DST jump has no offset and is sent bare.
    pub fn recorded_at_rfc3339(&self) -> String {
        match Local.from_local_datetime(&self.recorded_at).earliest() {
            Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, false),
            None => self.recorded_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Parses the store formats: `TS_FORMAT`, ISO `T`-separated with optional
/// fraction, or RFC3339 with offset (converted to local wall-clock time).
pub fn parse_timestamp(text: &str) -> anyhow::Result<NaiveDateTime> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(truncate_to_seconds(ts.with_timezone(&Local).naive_local()));
    }
    NaiveDateTime::parse_from_str(text, TS_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(truncate_to_seconds)
        .map_err(|e| anyhow::anyhow!("bad timestamp {:?}: {}", text, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> NaiveDateTime {
        parse_timestamp("2024-03-01 10:00:00").unwrap()
    }

    #[test]
    fn test_half_is_negative() {
        let rec = PredictionRecord::new("a", 0.5, ts());
        assert_eq!(rec.classification(), Classification::Negative);
        assert!(!rec.is_positive());
    }

    #[test]
    fn test_confidence_mirrors_negative() {
        let neg = PredictionRecord::new("a", 0.2, ts());
        assert!((neg.confidence() - 0.8).abs() < 1e-12);
        let pos = PredictionRecord::new("a", 0.9, ts());
        assert!((pos.confidence() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_subsecond_dropped() {
        let base = ts().with_nanosecond(123_456_789).unwrap();
        let rec = PredictionRecord::new("a", 0.1, base);
        assert_eq!(rec.recorded_at_text(), "2024-03-01 10:00:00");
    }

    #[test]
    fn test_parse_iso_with_fraction() {
        let ts = parse_timestamp("2024-03-01T10:00:00.250").unwrap();
        assert_eq!(ts, parse_timestamp("2024-03-01 10:00:00").unwrap());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_serde_derives_no_classification_field() {
        let rec = PredictionRecord::new("Ana", 0.7, ts()).with_id(RecordId(4));
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["id"], 4);
        assert!(v.get("classification").is_none());
        let back: PredictionRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_rfc3339_carries_offset_and_reads_back() {
        let rec = PredictionRecord::new("Ana", 0.4, ts());
        let text = rec.recorded_at_rfc3339();
        assert!(DateTime::parse_from_rfc3339(&text).is_ok(), "{}", text);
        assert_eq!(parse_timestamp(&text).unwrap(), rec.recorded_at);

        let utc = DateTime::parse_from_rfc3339(&text).unwrap().with_timezone(&chrono::Utc).to_rfc3339();
        assert_eq!(parse_timestamp(&utc).unwrap(), rec.recorded_at);
    }
}
