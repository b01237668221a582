use std::sync::Arc;

use async_trait::async_trait;

use super::{BucketLocator, SynthError, Target, TargetKind};
use crate::binding::{self, BindingGrant, Consumer, ConsumerKind, Permission};
use crate::client::{BucketClient, BucketError, GcsAuth, GcsBucketClient};
use crate::infra::{InfraDefinition, InfraResource, PublicAccessPrevention};
use crate::resource::naming::{generate_name, path_hash, CaseConvention, NameOptions};
use crate::resource::Bucket;
use crate::state::DeploymentState;

pub const GCP_READ_ROLE: &str = "roles/storage.objectViewer";
/// `objectCreator` cannot overwrite or delete, which `put` and `delete` need.
pub const GCP_WRITE_ROLE: &str = "roles/storage.objectUser";

const PUBLIC_MEMBER: &str = "allUsers";

/// Four random bytes, eight hex characters.
const SUFFIX_BYTES: usize = 4;

fn bucket_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

fn account_id_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

/// Bucket names are 3-63 characters; 9 are reserved for `-` and the random
/// suffix. Dots are allowed by GCS but require domain verification, so they
/// are not generated. No hash: the random suffix provides global uniqueness.
const BUCKET_NAME_OPTS: NameOptions = NameOptions {
    max_len: 54,
    case: CaseConvention::Lowercase,
    allowed: bucket_name_char,
    include_hash: false,
    sep: '-',
};

/// Service account ids are 6-30 characters.
const SERVICE_ACCOUNT_OPTS: NameOptions = NameOptions {
    max_len: 30,
    case: CaseConvention::Lowercase,
    allowed: account_id_char,
    include_hash: true,
    sep: '-',
};

/// Google Cloud target: GCS buckets, IAM members and GCS runtime clients.
#[derive(Debug, Clone)]
pub struct GcpTarget {
    project_id: String,
    storage_location: String,
    auth: GcsAuth,
    endpoint: Option<String>,
}

impl GcpTarget {
    pub fn new(project_id: impl Into<String>, storage_location: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            storage_location: storage_location.into(),
            auth: GcsAuth::MetadataServer,
            endpoint: None,
        }
    }

    pub fn with_auth(mut self, auth: GcsAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// IAM member for the service account a function runs as.
    pub fn service_account_member(&self, consumer: &Consumer) -> String {
        let account_id = generate_name(&consumer.id, None, &SERVICE_ACCOUNT_OPTS);
        format!(
            "serviceAccount:{account_id}@{}.iam.gserviceaccount.com",
            self.project_id
        )
    }
}

#[async_trait]
impl Target for GcpTarget {
    fn kind(&self) -> TargetKind {
        TargetKind::Gcp
    }

    fn synthesize(
        &self,
        bucket: &Bucket,
        state: &DeploymentState,
        infra: &mut InfraDefinition,
    ) -> Result<BucketLocator, SynthError> {
        let id = bucket.id();
        let base = generate_name(id, bucket.name_hint(), &BUCKET_NAME_OPTS);

        // GCS has no name-prefix mechanism, so uniqueness comes from a random
        // suffix kept in deployment state.
        let suffix = state.unique_suffix(id, SUFFIX_BYTES)?;
        infra.push(
            format!("{id}/Id"),
            InfraResource::RandomId {
                byte_length: suffix.byte_length,
                hex: suffix.hex.clone(),
            },
        );

        let name = format!("{base}-{}", suffix.hex);
        infra.push(
            format!("{id}/Default"),
            InfraResource::StorageBucket {
                name: name.clone(),
                location: self.storage_location.clone(),
                uniform_bucket_level_access: true,
                public_access_prevention: if bucket.is_public() {
                    PublicAccessPrevention::Inherited
                } else {
                    PublicAccessPrevention::Enforced
                },
            },
        );

        if bucket.is_public() {
            infra.push(
                format!("{id}/PublicAccessIamMember"),
                InfraResource::BucketIamMember {
                    bucket: name.clone(),
                    role: GCP_READ_ROLE.to_string(),
                    member: PUBLIC_MEMBER.to_string(),
                },
            );
        }

        for (key, body) in bucket.objects() {
            infra.push(
                format!("{id}/Object-{key}"),
                InfraResource::BucketObject {
                    bucket: name.clone(),
                    name: key.clone(),
                    content: body.clone(),
                },
            );
        }

        tracing::info!(bucket = id, %name, public = bucket.is_public(), "Synthesized GCS bucket");
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
        infra: &mut InfraDefinition,
    ) -> Result<BindingGrant, SynthError> {
        if consumer.kind != ConsumerKind::Function {
            return Err(SynthError::UnsupportedConsumer(format!(
                "Buckets can only be bound by GCP functions for now. ({} is a {})",
                consumer.id, consumer.kind
            )));
        }

        let ops = binding::resolve_ops(bucket.id(), consumer, ops)?;
        let permissions = binding::required_permissions(&ops);

        let member = self.service_account_member(consumer);
        // `a/b` and `a-b` flatten to the same text, the hash keeps them apart
        let grantee = format!("{}-{}", consumer.id.replace('/', "-"), path_hash(&consumer.id));
        let mut roles = Vec::new();
        for permission in &permissions {
            let (role, label) = match permission {
                Permission::Read => (GCP_READ_ROLE, "Read"),
                Permission::Write => (GCP_WRITE_ROLE, "Write"),
            };
            infra.push(
                format!("{}/{label}Access-{grantee}", bucket.id()),
                InfraResource::BucketIamMember {
                    bucket: locator.bucket_name.clone(),
                    role: role.to_string(),
                    member: member.clone(),
                },
            );
            roles.push(role.to_string());
        }

        let mut environment = locator.to_environment(bucket.id());
        environment.insert("GOOGLE_CLOUD_PROJECT".to_string(), self.project_id.clone());

        tracing::debug!(bucket = bucket.id(), consumer = %consumer.id, ?roles, "Bound consumer");
        Ok(BindingGrant {
            consumer: consumer.id.clone(),
            resource: bucket.id().to_string(),
            ops,
            permissions,
            roles,
            environment,
        })
    }

    async fn make_client(
        &self,
        locator: &BucketLocator,
    ) -> Result<Arc<dyn BucketClient>, BucketError> {
        let client = GcsBucketClient::new(
            &locator.bucket_name,
            locator.public,
            self.auth.clone(),
            self.endpoint.as_deref(),
        )
        .await
        .map_err(|e| BucketError::Transport(format!("Failed to create GCS client: {e}")))?;
        Ok(Arc::new(client))
    }
}
