use redb::{Database as RedbDatabase, ReadTransaction, ReadableTable, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;

const STATE_FILE: &str = "deployment.redb";
const LINEAGE_KEY: &str = "lineage";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("State database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to generate random suffix")]
    Random,
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for StateError {
    fn from(e: redb::CommitError) -> Self {
        StateError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for StateError {
    fn from(e: redb::DatabaseError) -> Self {
        StateError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::StorageError> for StateError {
    fn from(e: redb::StorageError) -> Self {
        StateError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for StateError {
    fn from(e: redb::TableError) -> Self {
        StateError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for StateError {
    fn from(e: redb::TransactionError) -> Self {
        StateError::Transaction(Box::new(e))
    }
}

/// Persisted state of one deployment.
///
/// Holds values that must survive re-synthesis, keyed by resource id. The
/// lineage identifies the deployment and is generated when the state file is
/// first created.
#[derive(Clone)]
pub struct DeploymentState {
    db: Arc<RedbDatabase>,
    lineage: String,
}

impl DeploymentState {
    /// Open or create the state file in `state_dir`
    pub fn open<P: AsRef<Path>>(state_dir: P) -> Result<Self, StateError> {
        std::fs::create_dir_all(state_dir.as_ref())?;
        let db_path = state_dir.as_ref().join(STATE_FILE);
        let db = Arc::new(RedbDatabase::create(db_path)?);

        let write_txn = db.begin_write()?;
        let lineage = {
            let _ = write_txn.open_table(UNIQUE_SUFFIXES)?;
            let mut metadata = write_txn.open_table(METADATA)?;
            let existing = metadata.get(LINEAGE_KEY)?.map(|v| v.value().to_string());
            match existing {
                Some(lineage) => lineage,
                None => {
                    let lineage = uuid::Uuid::new_v4().to_string();
                    metadata.insert(LINEAGE_KEY, lineage.as_str())?;
                    lineage
                }
            }
        };
        write_txn.commit()?;

        tracing::debug!(%lineage, "Opened deployment state");
        Ok(Self { db, lineage })
    }

    pub fn lineage(&self) -> &str {
        &self.lineage
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, StateError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, StateError> {
        Ok(self.db.begin_write()?)
    }
}
