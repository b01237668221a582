pub mod naming;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::binding::Consumer;
use crate::target::{SynthError, Target};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketProps {
    #[serde(default)]
    pub public: bool,
    /// Human-readable hint for the physical name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Bucket lifecycle events a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketEvent {
    Create,
    Update,
    Delete,
    /// Any of the above.
    Event,
}

impl BucketEvent {
    pub fn method_name(&self) -> &'static str {
        match self {
            BucketEvent::Create => "on_create",
            BucketEvent::Update => "on_update",
            BucketEvent::Delete => "on_delete",
            BucketEvent::Event => "on_event",
        }
    }
}

impl fmt::Display for BucketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// A bucket declared by application code, independent of any target.
#[derive(Debug, Clone)]
pub struct Bucket {
    id: String,
    visibility: Visibility,
    name: Option<String>,
    objects: BTreeMap<String, String>,
}

impl Bucket {
    pub fn new(id: impl Into<String>, props: BucketProps) -> Self {
        Self {
            id: id.into(),
            visibility: if props.public {
                Visibility::Public
            } else {
                Visibility::Private
            },
            name: props.name,
            objects: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn name_hint(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Seed an object that is provisioned and torn down with the bucket.
    pub fn add_object(&mut self, key: impl Into<String>, body: impl Into<String>) {
        self.objects.insert(key.into(), body.into());
    }

    pub fn objects(&self) -> &BTreeMap<String, String> {
        &self.objects
    }

    /// Run `handler` whenever an object is uploaded.
    pub fn on_create(&self, target: &dyn Target, handler: &Consumer) -> Result<(), SynthError> {
        target.subscribe(self, BucketEvent::Create, handler)
    }

    /// Run `handler` whenever an object is overwritten.
    pub fn on_update(&self, target: &dyn Target, handler: &Consumer) -> Result<(), SynthError> {
        target.subscribe(self, BucketEvent::Update, handler)
    }

    /// Run `handler` whenever an object is deleted.
    pub fn on_delete(&self, target: &dyn Target, handler: &Consumer) -> Result<(), SynthError> {
        target.subscribe(self, BucketEvent::Delete, handler)
    }

    /// Run `handler` on any create, update or delete.
    pub fn on_event(&self, target: &dyn Target, handler: &Consumer) -> Result<(), SynthError> {
        target.subscribe(self, BucketEvent::Event, handler)
    }
}
