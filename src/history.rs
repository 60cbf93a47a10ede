//! In-memory prediction history owned by whoever manages a session.

use crate::analyzer::{summarize, Summary};
use crate::drift_tracker::{drift_signal, DriftResult};
use crate::record::{PredictionRecord, RecordId};

/// Insertion-ordered collection of records.
///
/// Ids are assigned on push and never reused, even across `clear`.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<PredictionRecord>,
    next_id: i64,
}

impl History {
    pub fn new() -> Self {
        Self { records: Vec::new(), next_id: 1 }
    }

    pub fn from_records(records: Vec<PredictionRecord>) -> Self {
        let next_id = records
            .iter()
            .filter_map(|r| r.id.map(|id| id.0))
            .max()
            .unwrap_or(0)
            + 1;
        Self { records, next_id }
    }

    pub fn push(&mut self, mut record: PredictionRecord) -> RecordId {
        let id = RecordId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        record.id = Some(id);
        self.records.push(record);
        id
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&PredictionRecord> {
        self.records.last()
    }

    pub fn get(&self, id: RecordId) -> Option<&PredictionRecord> {
        self.records.iter().find(|r| r.id == Some(id))
    }

    pub fn set_feedback(&mut self, id: RecordId, text: &str) -> bool {
        match self.records.iter_mut().find(|r| r.id == Some(id)) {
            Some(rec) => {
                rec.feedback = Some(text.to_string());
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: RecordId) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != Some(id));
        self.records.len() != before
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn summary(&self) -> Option<Summary> {
        summarize(&self.records)
    }

    pub fn drift(&self, window: usize) -> Option<DriftResult> {
        drift_signal(&self.records, window)
    }
}
