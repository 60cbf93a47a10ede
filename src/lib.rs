//! Spiral-drawing screening: classify an uploaded drawing, keep a history of
//! results, and report aggregate statistics and drift over that history.

pub mod admin;
pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod drift_tracker;
pub mod error;
pub mod history;
pub mod indicators;
pub mod logging;
pub mod record;
pub mod reliability;
pub mod report;
pub mod session;
pub mod storage;

pub use analyzer::{detection_rate, summarize, RiskBuckets, Summary};
pub use drift_tracker::{drift_signal, DriftResult, DriftTrend};
pub use error::{SessionError, SessionResult};
pub use record::{Classification, PredictionRecord, RecordId};
