use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use super::RecordStore;
use crate::history::History;
use crate::record::{PredictionRecord, RecordId};

/// History held for the lifetime of one session.
#[derive(Debug, Default)]
pub struct SessionStore {
    history: Mutex<History>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self { history: Mutex::new(History::new()) }
    }

    fn with_history<T>(&self, f: impl FnOnce(&mut History) -> T) -> Result<T> {
        let mut guard = self
            .history
            .lock()
            .map_err(|_| anyhow!("session history lock poisoned"))?;
        Ok(f(&mut *guard))
    }
}

#[async_trait]
impl RecordStore for SessionStore {
    async fn append(&self, record: &PredictionRecord) -> Result<RecordId> {
        self.with_history(|h| h.push(record.clone()))
    }

    async fn list_all(&self) -> Result<Vec<PredictionRecord>> {
        self.with_history(|h| h.records().to_vec())
    }

    async fn update_feedback(&self, id: RecordId, text: &str) -> Result<bool> {
        self.with_history(|h| h.set_feedback(id, text))
    }

    async fn clear_all(&self) -> Result<bool> {
        self.with_history(|h| h.clear())?;
        Ok(true)
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        self.with_history(|h| h.remove(id))
    }

    fn backend_name(&self) -> &'static str {
        "session"
    }
}
