mod gcs;
mod sim;

pub use gcs::{GcsAuth, GcsBucketClient, DEFAULT_GCS_ENDPOINT};
pub use sim::{SimBucketClient, SimRegistry, SimStore};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("Object does not exist (key={0})")]
    NotFound(String),
    #[error("Object is not valid JSON (key={key}): {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize JSON: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Object is not valid UTF-8 (key={0})")]
    InvalidUtf8(String),
    #[error("Backend error: {0}")]
    Transport(String),
    #[error("{0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Fail with `NotFound` instead of tolerating an absent key.
    pub must_exist: bool,
}

impl DeleteOptions {
    pub fn must_exist() -> Self {
        Self { must_exist: true }
    }
}

/// The runtime contract every bucket backend satisfies.
///
/// Backends implement the five primitives; the JSON and `try_*` operations are
/// provided on top of them so their behavior is the same everywhere. The
/// `try_*` operations check existence and then act in a second call. Another
/// writer can change the object in between, so `try_get` may still fail with
/// `NotFound` and `try_delete` may report `true` for an object someone else
/// already removed.
#[async_trait]
pub trait BucketClient: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, BucketError>;

    async fn put(&self, key: &str, body: &str) -> Result<(), BucketError>;

    /// Fails with `NotFound` when `key` is absent.
    async fn get(&self, key: &str) -> Result<String, BucketError>;

    /// Delete primitive. Fails with `NotFound` when `key` is absent.
    async fn remove(&self, key: &str) -> Result<(), BucketError>;

    /// Keys starting with `prefix`, or every key when `prefix` is `None`.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, BucketError>;

    async fn put_json(&self, key: &str, value: &Value) -> Result<(), BucketError> {
        let body = serde_json::to_string_pretty(value).map_err(BucketError::Serialize)?;
        self.put(key, &body).await
    }

    async fn get_json(&self, key: &str) -> Result<Value, BucketError> {
        let body = self.get(key).await?;
        serde_json::from_str(&body).map_err(|source| BucketError::Parse {
            key: key.to_string(),
            source,
        })
    }

    async fn try_get(&self, key: &str) -> Result<Option<String>, BucketError> {
        if self.exists(key).await? {
            return self.get(key).await.map(Some);
        }
        Ok(None)
    }

    /// Absence yields `None`; content that is not JSON is still an error.
    async fn try_get_json(&self, key: &str) -> Result<Option<Value>, BucketError> {
        if self.exists(key).await? {
            return self.get_json(key).await.map(Some);
        }
        Ok(None)
    }

    /// Only absence is tolerated without `must_exist`; transport failures
    /// always propagate.
    async fn delete(&self, key: &str, opts: DeleteOptions) -> Result<(), BucketError> {
        match self.remove(key).await {
            Err(BucketError::NotFound(_)) if !opts.must_exist => Ok(()),
            result => result,
        }
    }

    async fn try_delete(&self, key: &str) -> Result<bool, BucketError> {
        if self.exists(key).await? {
            self.delete(key, DeleteOptions::default()).await?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn public_url(&self, key: &str) -> Result<String, BucketError> {
        Err(BucketError::Unsupported(format!(
            "publicUrl is not supported yet. (key={key})"
        )))
    }
}
