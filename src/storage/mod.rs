//! Record storage behind one capability trait.
//!
//! Backends: `SessionStore` (process-lifetime memory), `SqliteStore` (local
//! file), `RemoteStore` (PostgREST-style HTTP table).

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{Config, StoreBackend};
use crate::record::{PredictionRecord, RecordId};

mod memory;
mod remote;
mod sqlite;

pub use memory::SessionStore;
pub use remote::RemoteStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record and return its id.
    async fn append(&self, record: &PredictionRecord) -> Result<RecordId>;

    /// All records, chronological ascending, with ids set.
    async fn list_all(&self) -> Result<Vec<PredictionRecord>>;

    /// `Ok(false)` when no record has `id`.
    async fn update_feedback(&self, id: RecordId, text: &str) -> Result<bool>;

    async fn clear_all(&self) -> Result<bool>;

    /// `Ok(false)` when no record has `id`.
    async fn delete(&self, id: RecordId) -> Result<bool>;

    fn backend_name(&self) -> &'static str;
}

pub fn build_store(cfg: &Config) -> Result<Box<dyn RecordStore>> {
    match cfg.store_backend {
        StoreBackend::Session => Ok(Box::new(SessionStore::new())),
        StoreBackend::Sqlite => Ok(Box::new(SqliteStore::open(&cfg.sqlite_path)?)),
        StoreBackend::Remote => Ok(Box::new(RemoteStore::from_config(cfg)?)),
    }
}
