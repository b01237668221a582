//! Declarative resource graph emitted by synthesis.
//!
//! Entries are materialized later by a deployment step; synthesis only decides
//! which resources exist and with which parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicAccessPrevention {
    /// No public access regardless of IAM grants.
    Enforced,
    /// Public access follows IAM grants.
    Inherited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InfraResource {
    #[serde(rename = "random_id")]
    RandomId { byte_length: usize, hex: String },

    #[serde(rename = "google_storage_bucket")]
    StorageBucket {
        name: String,
        location: String,
        uniform_bucket_level_access: bool,
        public_access_prevention: PublicAccessPrevention,
    },

    #[serde(rename = "google_storage_bucket_iam_member")]
    BucketIamMember {
        bucket: String,
        role: String,
        member: String,
    },

    #[serde(rename = "google_storage_bucket_object")]
    BucketObject {
        bucket: String,
        name: String,
        content: String,
    },

    #[serde(rename = "sim_bucket")]
    SimBucket {
        name: String,
        public: bool,
        objects: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfraEntry {
    /// Construct path of the emitted resource, e.g. `root/Bucket/Default`.
    pub address: String,
    #[serde(flatten)]
    pub resource: InfraResource,
}

/// Ordered list of emitted resources. Addresses are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfraDefinition {
    entries: Vec<InfraEntry>,
}

impl InfraDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource, replacing any earlier entry at the same address.
    pub fn push(&mut self, address: impl Into<String>, resource: InfraResource) {
        let address = address.into();
        match self.entries.iter_mut().find(|e| e.address == address) {
            Some(existing) => existing.resource = resource,
            None => self.entries.push(InfraEntry { address, resource }),
        }
    }

    pub fn get(&self, address: &str) -> Option<&InfraResource> {
        self.entries
            .iter()
            .find(|e| e.address == address)
            .map(|e| &e.resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InfraEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
