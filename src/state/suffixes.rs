use chrono::Utc;
use redb::ReadableTable;
use ring::rand::{SecureRandom, SystemRandom};

use super::db::{DeploymentState, StateError};
use super::models::SuffixRecord;
use super::tables::*;
use crate::resource::naming::hex;

impl DeploymentState {
    // ========================================================================
    // Uniqueness suffixes
    // ========================================================================

    /// Return the persisted suffix for `resource`, generating and storing
    /// `byte_length` random bytes the first time it is asked for.
    ///
    /// A stored record is returned as-is even if `byte_length` differs.
    pub fn unique_suffix(
        &self,
        resource: &str,
        byte_length: usize,
    ) -> Result<SuffixRecord, StateError> {
        debug_assert!(!resource.is_empty(), "resource id must not be empty");

        let write_txn = self.begin_write()?;
        let record = {
            let mut table = write_txn.open_table(UNIQUE_SUFFIXES)?;
            let existing = match table.get(resource)? {
                Some(data) => Some(rmp_serde::from_slice::<SuffixRecord>(data.value())?),
                None => None,
            };

            match existing {
                Some(record) => record,
                None => {
                    let record = generate(resource, byte_length)?;
                    let data = rmp_serde::to_vec_named(&record)?;
                    table.insert(resource, data.as_slice())?;
                    tracing::info!(resource, hex = %record.hex, "Generated unique suffix");
                    record
                }
            }
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Look up a suffix without generating one.
    pub fn get_suffix(&self, resource: &str) -> Result<Option<SuffixRecord>, StateError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(UNIQUE_SUFFIXES)?;

        match table.get(resource)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// All persisted suffixes, ordered by resource id.
    pub fn suffixes(&self) -> Result<Vec<SuffixRecord>, StateError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(UNIQUE_SUFFIXES)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, data) = entry?;
            records.push(rmp_serde::from_slice(data.value())?);
        }
        Ok(records)
    }

    /// Forget the suffix of a deprovisioned resource. The next synthesis of
    /// the same id yields a new physical name.
    pub fn remove_suffix(&self, resource: &str) -> Result<bool, StateError> {
        let write_txn = self.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(UNIQUE_SUFFIXES)?;
            let removed = table.remove(resource)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

fn generate(resource: &str, byte_length: usize) -> Result<SuffixRecord, StateError> {
    let mut bytes = vec![0u8; byte_length];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| StateError::Random)?;

    Ok(SuffixRecord {
        resource: resource.to_string(),
        byte_length,
        hex: hex(&bytes),
        created_at: Utc::now(),
    })
}
