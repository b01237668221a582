use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{BucketLocator, SynthError, Target, TargetKind};
use crate::binding::{self, BindingGrant, Consumer};
use crate::client::{BucketClient, BucketError, SimBucketClient, SimRegistry};
use crate::infra::{InfraDefinition, InfraResource};
use crate::resource::naming::{generate_name, CaseConvention, NameOptions};
use crate::resource::Bucket;
use crate::state::DeploymentState;

fn sim_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

/// Simulator names only need to be unique within one simulator instance, so a
/// hash of the resource id is enough.
const SIM_BUCKET_NAME_OPTS: NameOptions = NameOptions {
    max_len: 63,
    case: CaseConvention::Lowercase,
    allowed: sim_name_char,
    include_hash: true,
    sep: '-',
};

/// The local simulator. Buckets live in a shared [`SimRegistry`].
#[derive(Debug, Clone, Default)]
pub struct SimTarget {
    registry: SimRegistry,
}

impl SimTarget {
    pub fn new(registry: SimRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SimRegistry {
        &self.registry
    }
}

#[async_trait]
impl Target for SimTarget {
    fn kind(&self) -> TargetKind {
        TargetKind::Sim
    }

    fn synthesize(
        &self,
        bucket: &Bucket,
        _state: &DeploymentState,
        infra: &mut InfraDefinition,
    ) -> Result<BucketLocator, SynthError> {
        let name = generate_name(bucket.id(), bucket.name_hint(), &SIM_BUCKET_NAME_OPTS);

        infra.push(
            format!("{}/Default", bucket.id()),
            InfraResource::SimBucket {
                name: name.clone(),
                public: bucket.is_public(),
                objects: bucket.objects().clone(),
            },
        );

        tracing::debug!(bucket = bucket.id(), %name, "Synthesized simulated bucket");
        Ok(BucketLocator {
            bucket_name: name,
            public: bucket.is_public(),
        })
    }

    fn bind(
        &self,
        bucket: &Bucket,
        locator: &BucketLocator,
        consumer: &Consumer,
        ops: &[String],
        _infra: &mut InfraDefinition,
    ) -> Result<BindingGrant, SynthError> {
        let ops: BTreeSet<_> = binding::resolve_ops(bucket.id(), consumer, ops)?;
        Ok(BindingGrant {
            consumer: consumer.id.clone(),
            resource: bucket.id().to_string(),
            permissions: binding::required_permissions(&ops),
            ops,
            roles: Vec::new(),
            environment: locator.to_environment(bucket.id()),
        })
    }

    async fn make_client(
        &self,
        locator: &BucketLocator,
    ) -> Result<Arc<dyn BucketClient>, BucketError> {
        let store = self.registry.get(&locator.bucket_name).await.ok_or_else(|| {
            BucketError::Transport(format!(
                "Simulated bucket {} is not provisioned",
                locator.bucket_name
            ))
        })?;
        Ok(Arc::new(SimBucketClient::new(
            locator.bucket_name.clone(),
            locator.public,
            store,
        )))
    }
}
