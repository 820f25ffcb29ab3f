//! Copilot Storage - Incident Store
//!
//! Append-only log of intake transactions with bounded newest-first listing.
//! The store assigns ids and serializes appends itself, so listing order is
//! insertion order.

pub mod lmdb;
pub mod memory;

pub use lmdb::{LmdbIncidentStore, LmdbStoreError};
pub use memory::InMemoryIncidentStore;

use ::async_trait::async_trait;
use copilot_core::{CopilotResult, IncidentId, IncidentRecord, NewIncidentRecord};

/// Persistence contract for incident records.
///
/// Each call is atomic with respect to other calls: a record is either fully
/// visible or absent.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Persist one record and return its id. Ids increase by one per append.
    ///
    /// # Errors
    /// `StorageError::Unavailable` if the backing store cannot be written.
    async fn append(&self, record: NewIncidentRecord) -> CopilotResult<IncidentId>;

    /// Up to `limit` records, newest first. `limit == 0` yields nothing.
    async fn list_recent(&self, limit: usize) -> CopilotResult<Vec<IncidentRecord>>;

    /// Cheap read that proves the store is usable.
    async fn health_check(&self) -> CopilotResult<StoreStatistics>;

    /// Make every acknowledged append durable. Called on shutdown.
    async fn flush(&self) -> CopilotResult<()>;
}

/// Store statistics for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    pub record_count: u64,
    pub last_id: Option<IncidentId>,
}
