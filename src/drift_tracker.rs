//! Drift signal over the prediction history.
//!
//! Compares the mean probability of the earliest records against the most
//! recent ones. A crude heuristic: it flags that the model's outputs on new
//! inputs are shifting, it is not a change-point test.

use serde::{Deserialize, Serialize};

use crate::indicators::{mean, moving_average};
use crate::record::PredictionRecord;

pub const DEFAULT_WINDOW: usize = 3;

/// Shift in percentage points at which drift stops being `Stable`.
pub const DRIFT_THRESHOLD_PCT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftTrend {
    Stable,
    Rising,
    Falling,
}

impl DriftTrend {
    pub fn from_drift_value(drift_value: f64) -> Self {
        if drift_value.abs() < DRIFT_THRESHOLD_PCT {
            DriftTrend::Stable
        } else if drift_value >= DRIFT_THRESHOLD_PCT {
            DriftTrend::Rising
        } else {
            DriftTrend::Falling
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriftTrend::Stable => "stable",
            DriftTrend::Rising => "rising",
            DriftTrend::Falling => "falling",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    pub window: usize,
    /// Trailing average, one point per record in chronological order.
    pub moving_average: Vec<f64>,
    pub early_mean: f64,
    pub late_mean: f64,
    /// `(late_mean - early_mean) * 100`, in percentage points.
    pub drift_value: f64,
    pub trend: DriftTrend,
}

/// Drift between the first and last `window` records.
///
/// Returns `None` for fewer than two records. Input order is not trusted:
/// records are re-sorted by `recorded_at` (stable, so ties keep insertion order).
pub fn drift_signal(records: &[PredictionRecord], window: usize) -> Option<DriftResult> {
    if records.len() < 2 {
        return None;
    }
    let window = window.max(1);

    let mut ordered: Vec<&PredictionRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.recorded_at);
    let probs: Vec<f64> = ordered.iter().map(|r| r.probability()).collect();

    let n = probs.len();
    let k = window.min(n);
    let early_mean = mean(&probs[..k])?;
    let late_mean = mean(&probs[n - k..])?;
    let drift_value = (late_mean - early_mean) * 100.0;

    Some(DriftResult {
        window,
        moving_average: moving_average(&probs, window),
        early_mean,
        late_mean,
        drift_value,
        trend: DriftTrend::from_drift_value(drift_value),
    })
}
