//! Integration test: aggregate statistics and drift over whole histories.
//!
//! Exercises the public analyzer API the way a dashboard would: one
//! re-evaluation per snapshot of the history.

use spiralscreen::analyzer::RiskBucket;
use spiralscreen::history::History;
use spiralscreen::record::parse_timestamp;
use spiralscreen::{detection_rate, drift_signal, summarize, DriftTrend, PredictionRecord};

fn series(probs: &[f64]) -> Vec<PredictionRecord> {
    probs
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let ts = parse_timestamp(&format!("2024-06-01 12:{:02}:00", i)).unwrap();
            PredictionRecord::new(format!("subject-{}", i % 3), *p, ts)
        })
        .collect()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn counts_split_and_buckets_are_exhaustive() {
    let probs = [0.0, 0.01, 0.249, 0.25, 0.4999, 0.5, 0.5001, 0.74, 0.75, 0.99, 1.0];
    let records = series(&probs);
    let s = summarize(&records).expect("non-empty");

    assert_eq!(s.total, probs.len());
    assert_eq!(s.positive_count + s.negative_count, s.total);
    assert_eq!(s.risk_buckets.total(), s.total);
    assert_eq!(s.risk_buckets.low, 3);
    assert_eq!(s.risk_buckets.moderate, 2);
    assert_eq!(s.risk_buckets.elevated, 3);
    assert_eq!(s.risk_buckets.high, 3);
    // 0.5 is negative; only strictly greater counts as positive
    assert_eq!(s.positive_count, 5);
}

#[test]
fn boundary_values_land_in_higher_bucket() {
    assert_eq!(RiskBucket::for_probability(0.25), RiskBucket::Moderate);
    assert_eq!(RiskBucket::for_probability(0.50), RiskBucket::Elevated);
    assert_eq!(RiskBucket::for_probability(0.75), RiskBucket::High);
}

#[test]
fn empty_and_singleton_histories_signal_no_data() {
    assert!(summarize(&[]).is_none());
    assert!(drift_signal(&series(&[0.4]), 3).is_none());
    assert!(drift_signal(&[], 3).is_none());
}

#[test]
fn gentle_ramp_is_stable() {
    let drift = drift_signal(&series(&[0.10, 0.20, 0.30]), 3).unwrap();
    assert_eq!(drift.moving_average.len(), 3);
    assert!(close(drift.moving_average[0], 0.10));
    assert!(close(drift.moving_average[1], 0.15));
    assert!(close(drift.moving_average[2], 0.20));
    assert!(close(drift.early_mean, 0.20));
    assert!(close(drift.late_mean, 0.20));
    assert!(close(drift.drift_value, 0.0));
    assert_eq!(drift.trend, DriftTrend::Stable);
}

#[test]
fn step_change_is_rising() {
    let drift = drift_signal(&series(&[0.10, 0.10, 0.10, 0.90, 0.90, 0.90]), 3).unwrap();
    assert!(close(drift.early_mean, 0.10));
    assert!(close(drift.late_mean, 0.90));
    assert!(close(drift.drift_value, 80.0));
    assert_eq!(drift.trend, DriftTrend::Rising);
    assert!(close(drift.moving_average[3], (0.1 + 0.1 + 0.9) / 3.0));
}

#[test]
fn step_down_is_falling() {
    let drift = drift_signal(&series(&[0.8, 0.8, 0.2, 0.2]), 2).unwrap();
    assert!(close(drift.drift_value, -60.0));
    assert_eq!(drift.trend, DriftTrend::Falling);
}

#[test]
fn subjects_are_case_sensitive() {
    let ts = parse_timestamp("2024-06-01 12:00:00").unwrap();
    let records = vec![
        PredictionRecord::new("Ana", 0.2, ts),
        PredictionRecord::new("ana", 0.3, ts),
        PredictionRecord::new("Ana", 0.4, ts),
    ];
    assert_eq!(summarize(&records).unwrap().unique_subjects, 2);
}

#[test]
fn clear_then_append_starts_fresh() {
    let mut history = History::new();
    for rec in series(&[0.9, 0.8, 0.7]) {
        history.push(rec);
    }
    assert_eq!(history.summary().unwrap().total, 3);

    history.clear();
    assert!(history.summary().is_none());
    assert!(history.drift(3).is_none());

    history.push(PredictionRecord::now("new", 0.2));
    let s = history.summary().unwrap();
    assert_eq!(s.total, 1);
    assert_eq!(s.positive_count, 0);
    assert!(close(detection_rate(&s), 0.0));
}
