//! In-memory incident store for tests and ephemeral deployments.

use std::sync::RwLock;

use ::async_trait::async_trait;
use copilot_core::{
    CopilotResult, IncidentId, IncidentRecord, NewIncidentRecord, StorageError,
};

use crate::{IncidentStore, StoreStatistics};

/// Store backed by a vector under a lock. Records are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryIncidentStore {
    records: RwLock<Vec<IncidentRecord>>,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn append(&self, record: NewIncidentRecord) -> CopilotResult<IncidentId> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let id = records.last().map(|r| r.id + 1).unwrap_or(1);
        records.push(record.with_id(id));
        Ok(id)
    }

    async fn list_recent(&self, limit: usize) -> CopilotResult<Vec<IncidentRecord>> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    async fn health_check(&self) -> CopilotResult<StoreStatistics> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(StoreStatistics {
            record_count: records.len() as u64,
            last_id: records.last().map(|r| r.id),
        })
    }

    async fn flush(&self) -> CopilotResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_core::{Disposition, IncidentReport, StructuredResponse};

    fn record(category: &str) -> NewIncidentRecord {
        NewIncidentRecord::from_report(
            &IncidentReport::new(category, "agent", ""),
            "",
            StructuredResponse::default(),
            Disposition::Parsed,
        )
    }

    #[tokio::test]
    async fn test_listing_order() {
        let store = InMemoryIncidentStore::new();
        for category in ["A", "B", "C"] {
            store.append(record(category)).await.expect("append should succeed");
        }
        let recent = store.list_recent(2).await.expect("list should succeed");
        let categories: Vec<&str> = recent.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["C", "B"]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_statistics() {
        let store = InMemoryIncidentStore::new();
        assert!(store.is_empty());
        store.append(record("A")).await.expect("append should succeed");
        let stats = store.health_check().await.expect("stats should succeed");
        assert_eq!(stats.record_count, 1);
        assert_eq!(stats.last_id, Some(1));
    }
}
