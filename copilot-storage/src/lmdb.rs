//! LMDB-backed incident store.
//!
//! Uses the heed crate (Rust bindings for LMDB). Records live in one named
//! database keyed by the big-endian record id, so byte order is id order and
//! a reverse cursor walks newest first.
//!
//! # Thread Safety
//!
//! LMDB admits a single writer at a time. The next id is read and written
//! inside the same write transaction, which serializes concurrent appends.
//! All LMDB calls run on the blocking pool.

use std::path::{Path, PathBuf};

use ::async_trait::async_trait;
use copilot_core::{
    CopilotError, CopilotResult, IncidentId, IncidentRecord, NewIncidentRecord, StorageError,
    StoreConfig,
};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::{IncidentStore, StoreStatistics};

const DB_NAME: &str = "incidents";

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored value could not be decoded.
    #[error("Record {id} could not be decoded: {reason}")]
    Deserialization { id: u64, reason: String },

    /// Blocking task failed.
    #[error("Blocking task failed: {0}")]
    Join(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for CopilotError {
    fn from(e: LmdbStoreError) -> Self {
        match e {
            LmdbStoreError::Deserialization { id, reason } => {
                CopilotError::Storage(StorageError::Corrupt { id, reason })
            }
            other => CopilotError::Storage(StorageError::unavailable(other.to_string())),
        }
    }
}

fn txn_err(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

fn decode_key(key: &[u8]) -> Result<IncidentId, LmdbStoreError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| LmdbStoreError::Transaction(format!("invalid key length {}", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Durable incident store.
///
/// # Example
///
/// ```ignore
/// let store = LmdbIncidentStore::open("/var/lib/copilot/incidents", 256)?;
/// let id = store.append(record).await?;
/// let recent = store.list_recent(20).await?;
/// ```
#[derive(Clone)]
pub struct LmdbIncidentStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    path: PathBuf,
}

impl LmdbIncidentStore {
    /// Open the store, creating the directory and database if absent.
    /// Opening an existing store keeps its records.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some(DB_NAME))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        tracing::info!(path = %path.as_ref().display(), max_size_mb, "Incident store opened");

        Ok(Self {
            env,
            db,
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn from_config(config: &StoreConfig) -> CopilotResult<Self> {
        Ok(Self::open(&config.path, config.map_size_mb)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_blocking(&self, record: NewIncidentRecord) -> Result<IncidentId, LmdbStoreError> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        let next_id = match self.db.last(&wtxn).map_err(txn_err)? {
            Some((key, _)) => decode_key(key)? + 1,
            None => 1,
        };

        let record = record.with_id(next_id);
        let value =
            serde_json::to_vec(&record).map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;
        let key = next_id.to_be_bytes();

        self.db
            .put(&mut wtxn, key.as_slice(), value.as_slice())
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        Ok(next_id)
    }

    fn list_blocking(&self, limit: usize) -> Result<Vec<IncidentRecord>, LmdbStoreError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let iter = self.db.rev_iter(&rtxn).map_err(txn_err)?;

        let mut records = Vec::with_capacity(limit.min(1024));
        for entry in iter.take(limit) {
            let (key, value) = entry.map_err(txn_err)?;
            let id = decode_key(key)?;
            let record: IncidentRecord = serde_json::from_slice(value).map_err(|e| {
                LmdbStoreError::Deserialization {
                    id,
                    reason: e.to_string(),
                }
            })?;
            records.push(record);
        }
        Ok(records)
    }

    fn statistics_blocking(&self) -> Result<StoreStatistics, LmdbStoreError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let record_count = self.db.len(&rtxn).map_err(txn_err)?;
        let last_id = match self.db.last(&rtxn).map_err(txn_err)? {
            Some((key, _)) => Some(decode_key(key)?),
            None => None,
        };
        Ok(StoreStatistics {
            record_count,
            last_id,
        })
    }

    /// Run an LMDB operation on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> CopilotResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T, LmdbStoreError> + Send + 'static,
    {
        let store = self.clone();
        let result = tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| LmdbStoreError::Join(e.to_string()))?;
        Ok(result?)
    }
}

#[async_trait]
impl IncidentStore for LmdbIncidentStore {
    async fn append(&self, record: NewIncidentRecord) -> CopilotResult<IncidentId> {
        let result = self
            .blocking(move |store| store.append_blocking(record))
            .await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Incident append failed");
        }
        result
    }

    async fn list_recent(&self, limit: usize) -> CopilotResult<Vec<IncidentRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.blocking(move |store| store.list_blocking(limit)).await
    }

    async fn health_check(&self) -> CopilotResult<StoreStatistics> {
        self.blocking(|store| store.statistics_blocking()).await
    }

    async fn flush(&self) -> CopilotResult<()> {
        self.blocking(|store| store.env.force_sync().map_err(txn_err))
            .await
    }
}

impl std::fmt::Debug for LmdbIncidentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbIncidentStore")
            .field("path", &self.path)
            .finish()
    }
}
