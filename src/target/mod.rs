//! Deployment targets.
//!
//! Each target supplies the four pieces that make a logical bucket concrete:
//! synthesis of its resources, binding of consumers, construction of the
//! runtime client, and (rejected) event subscriptions.

mod gcp;
mod sim;

pub use gcp::{GcpTarget, GCP_READ_ROLE, GCP_WRITE_ROLE};
pub use sim::SimTarget;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binding::{BindingGrant, Consumer};
use crate::client::{BucketClient, BucketError};
use crate::infra::InfraDefinition;
use crate::resource::naming::path_hash;
use crate::resource::{Bucket, BucketEvent};
use crate::state::{DeploymentState, StateError};

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("Resource {resource} does not support inflight operation {op} (requested by {consumer})")]
    UnsupportedOperation {
        resource: String,
        op: String,
        consumer: String,
    },
    #[error("{0}")]
    UnsupportedConsumer(String),
    #[error("{method} method isn't implemented yet on the current target.")]
    NotImplemented { method: &'static str },
    #[error("Duplicate resource id: {0}")]
    DuplicateResource(String),
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error("Deployment state error: {0}")]
    State(#[from] StateError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Sim,
    Gcp,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Sim => f.write_str("sim"),
            TargetKind::Gcp => f.write_str("gcp"),
        }
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sim" => Ok(TargetKind::Sim),
            "gcp" | "tf-gcp" => Ok(TargetKind::Gcp),
            other => Err(format!("unknown target '{other}' (expected sim or gcp)")),
        }
    }
}

/// What a runtime client needs to find its bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketLocator {
    pub bucket_name: String,
    pub public: bool,
}

impl BucketLocator {
    pub fn name_env_key(resource: &str) -> String {
        format!("BUCKET_NAME_{}", path_hash(resource).to_uppercase())
    }

    pub fn public_env_key(resource: &str) -> String {
        format!("BUCKET_PUBLIC_{}", path_hash(resource).to_uppercase())
    }

    /// Environment values a bound consumer receives for `resource`.
    pub fn to_environment(&self, resource: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (Self::name_env_key(resource), self.bucket_name.clone()),
            (Self::public_env_key(resource), self.public.to_string()),
        ])
    }

    /// Rebuild a locator from values produced by `to_environment`.
    pub fn from_environment<F>(resource: &str, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket_name = lookup(&Self::name_env_key(resource))?;
        let public = lookup(&Self::public_env_key(resource))
            .map(|v| v == "true")
            .unwrap_or(false);
        Some(Self {
            bucket_name,
            public,
        })
    }

    /// Rebuild a locator from the process environment.
    pub fn from_env(resource: &str) -> Option<Self> {
        Self::from_environment(resource, |key| std::env::var(key).ok())
    }
}

/// Per-target strategy for buckets.
#[async_trait]
pub trait Target: Send + Sync {
    fn kind(&self) -> TargetKind;

    /// Emit the bucket's resources into `infra` and return where runtime
    /// clients will find it.
    fn synthesize(
        &self,
        bucket: &Bucket,
        state: &DeploymentState,
        infra: &mut InfraDefinition,
    ) -> Result<BucketLocator, SynthError>;

    /// Grant `consumer` access for the declared `ops`, emitting any access
    /// resources into `infra`.
    fn bind(
        &self,
        bucket: &Bucket,
        locator: &BucketLocator,
        consumer: &Consumer,
        ops: &[String],
        infra: &mut InfraDefinition,
    ) -> Result<BindingGrant, SynthError>;

    async fn make_client(
        &self,
        locator: &BucketLocator,
    ) -> Result<Arc<dyn BucketClient>, BucketError>;

    /// No target implements bucket events yet.
    fn subscribe(
        &self,
        bucket: &Bucket,
        event: BucketEvent,
        handler: &Consumer,
    ) -> Result<(), SynthError> {
        tracing::debug!(bucket = bucket.id(), handler = %handler.id, %event, "Rejected event subscription");
        Err(SynthError::NotImplemented {
            method: event.method_name(),
        })
    }
}
