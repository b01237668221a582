//! Minimal application host: the buckets, consumers and lifts of one app.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::binding::{BindingGrant, Consumer, ConsumerKind};
use crate::infra::InfraDefinition;
use crate::resource::{Bucket, BucketEvent, BucketProps};
use crate::state::DeploymentState;
use crate::target::{BucketLocator, SynthError, Target, TargetKind};

const ROOT: &str = "root";

// ============================================================================
// Manifest
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub buckets: Vec<BucketDecl>,
    #[serde(default)]
    pub consumers: Vec<ConsumerDecl>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketDecl {
    pub id: String,
    #[serde(flatten)]
    pub props: BucketProps,
    #[serde(default)]
    pub objects: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerDecl {
    pub id: String,
    #[serde(default)]
    pub kind: ConsumerKind,
    #[serde(default)]
    pub lifts: Vec<LiftDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftDecl {
    pub bucket: String,
    pub ops: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionDecl {
    pub bucket: String,
    pub event: BucketEvent,
    pub handler: String,
}

impl Manifest {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let manifest = serde_json::from_str(&text)?;
        Ok(manifest)
    }
}

// ============================================================================
// App
// ============================================================================

#[derive(Debug, Clone)]
struct Lift {
    consumer: String,
    bucket: String,
    ops: Vec<String>,
}

#[derive(Debug, Clone)]
struct Subscription {
    bucket: String,
    event: BucketEvent,
    handler: String,
}

/// Result of synthesizing an app for one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthOutput {
    pub target: TargetKind,
    pub lineage: String,
    pub locators: BTreeMap<String, BucketLocator>,
    pub resources: InfraDefinition,
    pub grants: Vec<BindingGrant>,
}

#[derive(Debug, Clone, Default)]
pub struct App {
    buckets: Vec<Bucket>,
    consumers: Vec<Consumer>,
    lifts: Vec<Lift>,
    subscriptions: Vec<Subscription>,
}

fn path(id: &str) -> String {
    if id.starts_with("root/") {
        id.to_string()
    } else {
        format!("{ROOT}/{id}")
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_manifest(manifest: &Manifest) -> Result<Self, SynthError> {
        let mut app = App::new();
        for decl in &manifest.buckets {
            let bucket = app.add_bucket(&decl.id, decl.props.clone())?;
            for (key, body) in &decl.objects {
                bucket.add_object(key.clone(), body.clone());
            }
        }
        for decl in &manifest.consumers {
            let consumer = app.add_consumer(&decl.id, decl.kind.clone())?;
            for lift in &decl.lifts {
                app.lift(&consumer.id, &lift.bucket, lift.ops.as_slice())?;
            }
        }
        for decl in &manifest.subscriptions {
            app.subscribe(&decl.bucket, decl.event, &decl.handler)?;
        }
        Ok(app)
    }

    pub fn add_bucket(&mut self, id: &str, props: BucketProps) -> Result<&mut Bucket, SynthError> {
        let id = path(id);
        if self.bucket(&id).is_some() {
            return Err(SynthError::DuplicateResource(id));
        }
        self.buckets.push(Bucket::new(id, props));
        let index = self.buckets.len() - 1;
        Ok(&mut self.buckets[index])
    }

    pub fn add_consumer(&mut self, id: &str, kind: ConsumerKind) -> Result<Consumer, SynthError> {
        let id = path(id);
        if self.consumer(&id).is_some() || self.bucket(&id).is_some() {
            return Err(SynthError::DuplicateResource(id));
        }
        let consumer = Consumer { id, kind };
        self.consumers.push(consumer.clone());
        Ok(consumer)
    }

    /// Declare that `consumer` calls `ops` on `bucket` at run time.
    pub fn lift<S: AsRef<str>>(
        &mut self,
        consumer: &str,
        bucket: &str,
        ops: &[S],
    ) -> Result<(), SynthError> {
        let consumer = path(consumer);
        let bucket = path(bucket);
        if self.consumer(&consumer).is_none() {
            return Err(SynthError::UnknownResource(consumer));
        }
        if self.bucket(&bucket).is_none() {
            return Err(SynthError::UnknownResource(bucket));
        }
        self.lifts.push(Lift {
            consumer,
            bucket,
            ops: ops.iter().map(|op| op.as_ref().to_string()).collect(),
        });
        Ok(())
    }

    pub fn subscribe(
        &mut self,
        bucket: &str,
        event: BucketEvent,
        handler: &str,
    ) -> Result<(), SynthError> {
        let bucket = path(bucket);
        let handler = path(handler);
        if self.bucket(&bucket).is_none() {
            return Err(SynthError::UnknownResource(bucket));
        }
        if self.consumer(&handler).is_none() {
            return Err(SynthError::UnknownResource(handler));
        }
        self.subscriptions.push(Subscription {
            bucket,
            event,
            handler,
        });
        Ok(())
    }

    pub fn bucket(&self, id: &str) -> Option<&Bucket> {
        let id = path(id);
        self.buckets.iter().find(|b| b.id() == id)
    }

    pub fn consumer(&self, id: &str) -> Option<&Consumer> {
        let id = path(id);
        self.consumers.iter().find(|c| c.id == id)
    }

    /// Synthesize every bucket, bind every lift and wire every subscription.
    /// Grants are recomputed from scratch on each call.
    pub fn synth(
        &self,
        target: &dyn Target,
        state: &DeploymentState,
    ) -> Result<SynthOutput, SynthError> {
        let mut resources = InfraDefinition::new();
        let mut locators = BTreeMap::new();

        for bucket in &self.buckets {
            let locator = target.synthesize(bucket, state, &mut resources)?;
            locators.insert(bucket.id().to_string(), locator);
        }

        let mut grants = Vec::with_capacity(self.lifts.len());
        for lift in &self.lifts {
            let (bucket, consumer, locator) = self.edge(&lift.bucket, &lift.consumer, &locators)?;
            grants.push(target.bind(bucket, locator, consumer, &lift.ops, &mut resources)?);
        }

        for sub in &self.subscriptions {
            let (bucket, handler, _) = self.edge(&sub.bucket, &sub.handler, &locators)?;
            match sub.event {
                BucketEvent::Create => bucket.on_create(target, handler)?,
                BucketEvent::Update => bucket.on_update(target, handler)?,
                BucketEvent::Delete => bucket.on_delete(target, handler)?,
                BucketEvent::Event => bucket.on_event(target, handler)?,
            }
        }

        tracing::info!(
            deploy_target = %target.kind(),
            buckets = self.buckets.len(),
            grants = grants.len(),
            resources = resources.len(),
            "Synthesized app"
        );

        Ok(SynthOutput {
            target: target.kind(),
            lineage: state.lineage().to_string(),
            locators,
            resources,
            grants,
        })
    }

    fn edge<'a>(
        &'a self,
        bucket: &str,
        consumer: &str,
        locators: &'a BTreeMap<String, BucketLocator>,
    ) -> Result<(&'a Bucket, &'a Consumer, &'a BucketLocator), SynthError> {
        let bucket_ref = self
            .bucket(bucket)
            .ok_or_else(|| SynthError::UnknownResource(bucket.to_string()))?;
        let consumer_ref = self
            .consumer(consumer)
            .ok_or_else(|| SynthError::UnknownResource(consumer.to_string()))?;
        let locator = locators
            .get(bucket_ref.id())
            .ok_or_else(|| SynthError::UnknownResource(bucket.to_string()))?;
        Ok((bucket_ref, consumer_ref, locator))
    }
}
