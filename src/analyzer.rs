//! Aggregate statistics over a prediction history.
//!
//! Everything here is a read-only transform over a caller-supplied slice.
//! An empty history is "no data yet" and yields `None`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::record::PredictionRecord;

/// Histogram over `probability * 100` with bounds `[0,25) [25,50) [50,75) [75,100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskBuckets {
    pub low: usize,
    pub moderate: usize,
    pub elevated: usize,
    pub high: usize,
}

/// Bucket index for one probability; boundaries go to the higher bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBucket {
    Low,
    Moderate,
    Elevated,
    High,
}

impl RiskBucket {
    pub fn for_probability(probability: f64) -> Self {
        let pct = probability * 100.0;
        if pct < 25.0 {
            RiskBucket::Low
        } else if pct < 50.0 {
            RiskBucket::Moderate
        } else if pct < 75.0 {
            RiskBucket::Elevated
        } else {
            RiskBucket::High
        }
    }

    pub fn range_label(&self) -> &'static str {
        match self {
            RiskBucket::Low => "0-25%",
            RiskBucket::Moderate => "25-50%",
            RiskBucket::Elevated => "50-75%",
            RiskBucket::High => "75-100%",
        }
    }
}

impl RiskBuckets {
    pub fn add(&mut self, probability: f64) {
        match RiskBucket::for_probability(probability) {
            RiskBucket::Low => self.low += 1,
            RiskBucket::Moderate => self.moderate += 1,
            RiskBucket::Elevated => self.elevated += 1,
            RiskBucket::High => self.high += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.moderate + self.elevated + self.high
    }

    /// `(range label, count)` in ascending order.
    pub fn rows(&self) -> [(&'static str, usize); 4] {
        [
            (RiskBucket::Low.range_label(), self.low),
            (RiskBucket::Moderate.range_label(), self.moderate),
            (RiskBucket::Elevated.range_label(), self.elevated),
            (RiskBucket::High.range_label(), self.high),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub mean_probability: f64,
    pub max_probability: f64,
    pub min_probability: f64,
    pub unique_subjects: usize,
    pub risk_buckets: RiskBuckets,
}

pub fn summarize(records: &[PredictionRecord]) -> Option<Summary> {
    if records.is_empty() {
        return None;
    }

    let mut positive_count = 0usize;
    let mut sum = 0.0;
    let mut max_probability = f64::NEG_INFINITY;
    let mut min_probability = f64::INFINITY;
    let mut subjects: HashSet<&str> = HashSet::new();
    let mut risk_buckets = RiskBuckets::default();

    for rec in records {
        let p = rec.probability();
        if rec.is_positive() {
            positive_count += 1;
        }
        sum += p;
        max_probability = max_probability.max(p);
        min_probability = min_probability.min(p);
        subjects.insert(rec.subject_label.as_str());
        risk_buckets.add(p);
    }

    let total = records.len();
    Some(Summary {
        total,
        positive_count,
        negative_count: total - positive_count,
        mean_probability: sum / total as f64,
        max_probability,
        min_probability,
        unique_subjects: subjects.len(),
        risk_buckets,
    })
}

/// Share of positive records. A zero total reports 0.0.
pub fn detection_rate(summary: &Summary) -> f64 {
    if summary.total == 0 {
        0.0
    } else {
        summary.positive_count as f64 / summary.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_timestamp;

    fn rec(label: &str, p: f64) -> PredictionRecord {
        PredictionRecord::new(label, p, parse_timestamp("2024-01-01 00:00:00").unwrap())
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(RiskBucket::for_probability(0.0), RiskBucket::Low);
        assert_eq!(RiskBucket::for_probability(0.2499), RiskBucket::Low);
        assert_eq!(RiskBucket::for_probability(0.25), RiskBucket::Moderate);
        assert_eq!(RiskBucket::for_probability(0.5), RiskBucket::Elevated);
        assert_eq!(RiskBucket::for_probability(0.75), RiskBucket::High);
        assert_eq!(RiskBucket::for_probability(1.0), RiskBucket::High);
    }

    #[test]
    fn test_summary_fields() {
        let records = vec![rec("a", 0.1), rec("b", 0.9), rec("a", 0.5)];
        let s = summarize(&records).unwrap();
        assert_eq!(s.total, 3);
        assert_eq!(s.positive_count, 1);
        assert_eq!(s.negative_count, 2);
        assert_eq!(s.unique_subjects, 2);
        assert!((s.mean_probability - 0.5).abs() < 1e-12);
        assert!((s.max_probability - 0.9).abs() < 1e-12);
        assert!((s.min_probability - 0.1).abs() < 1e-12);
        assert_eq!(s.risk_buckets.total(), 3);
        assert!((detection_rate(&s) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_is_none() {
        assert!(summarize(&[]).is_none());
    }
}
