use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{BucketClient, BucketError};
use crate::infra::{InfraDefinition, InfraResource};

/// In-memory object storage for one simulated bucket.
#[derive(Debug, Default)]
pub struct SimStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl SimStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn clear(&self) -> usize {
        let mut objects = self.objects.write().await;
        let count = objects.len();
        objects.clear();
        count
    }
}

/// Simulated buckets by name, shared by the simulator and its consumers.
#[derive(Debug, Clone, Default)]
pub struct SimRegistry {
    buckets: Arc<RwLock<HashMap<String, Arc<SimStore>>>>,
}

impl SimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create every simulated bucket in `definition` and seed its initial
    /// objects. Buckets that already exist keep their contents; initial
    /// objects overwrite keys of the same name.
    pub async fn provision(&self, definition: &InfraDefinition) -> usize {
        let mut provisioned = 0;
        for entry in definition.iter() {
            if let InfraResource::SimBucket { name, objects, .. } = &entry.resource {
                let store = self.get_or_create(name).await;
                let mut contents = store.objects.write().await;
                for (key, body) in objects {
                    contents.insert(key.clone(), Bytes::copy_from_slice(body.as_bytes()));
                }
                tracing::info!(bucket = %name, objects = objects.len(), "Provisioned simulated bucket");
                provisioned += 1;
            }
        }
        provisioned
    }

    /// Remove a bucket together with its objects.
    pub async fn deprovision(&self, name: &str) -> bool {
        let removed = self.buckets.write().await.remove(name).is_some();
        if removed {
            tracing::info!(bucket = %name, "Deprovisioned simulated bucket");
        }
        removed
    }

    pub async fn get(&self, name: &str) -> Option<Arc<SimStore>> {
        self.buckets.read().await.get(name).cloned()
    }

    pub async fn get_or_create(&self, name: &str) -> Arc<SimStore> {
        let mut buckets = self.buckets.write().await;
        Arc::clone(buckets.entry(name.to_string()).or_default())
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Simulator backend for the bucket client contract.
pub struct SimBucketClient {
    name: String,
    public: bool,
    store: Arc<SimStore>,
}

impl SimBucketClient {
    pub fn new(name: impl Into<String>, public: bool, store: Arc<SimStore>) -> Self {
        Self {
            name: name.into(),
            public,
            store,
        }
    }
}

#[async_trait]
impl BucketClient for SimBucketClient {
    async fn exists(&self, key: &str) -> Result<bool, BucketError> {
        Ok(self.store.objects.read().await.contains_key(key))
    }

    async fn put(&self, key: &str, body: &str) -> Result<(), BucketError> {
        self.store
            .objects
            .write()
            .await
            .insert(key.to_string(), Bytes::copy_from_slice(body.as_bytes()));
        tracing::debug!(bucket = %self.name, public = self.public, key, "Put object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, BucketError> {
        let data = self
            .store
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BucketError::NotFound(key.to_string()))?;
        String::from_utf8(data.to_vec()).map_err(|_| BucketError::InvalidUtf8(key.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), BucketError> {
        match self.store.objects.write().await.remove(key) {
            Some(_) => {
                tracing::debug!(bucket = %self.name, key, "Deleted object");
                Ok(())
            }
            None => Err(BucketError::NotFound(key.to_string())),
        }
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, BucketError> {
        let objects = self.store.objects.read().await;
        let prefix = prefix.unwrap_or_default();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
