//! Target-neutral half of binding a consumer to a bucket.
//!
//! A consumer declares the client operations it will call. Binding validates
//! that declaration against the bucket's operation surface and reduces it to
//! coarse read/write permissions; targets map those onto their own roles.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::target::SynthError;

/// Operations of the bucket client contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketOp {
    Delete,
    Exists,
    Get,
    GetJson,
    List,
    PublicUrl,
    Put,
    PutJson,
    TryDelete,
    TryGet,
    TryGetJson,
}

impl BucketOp {
    pub const ALL: [BucketOp; 11] = [
        BucketOp::Delete,
        BucketOp::Exists,
        BucketOp::Get,
        BucketOp::GetJson,
        BucketOp::List,
        BucketOp::PublicUrl,
        BucketOp::Put,
        BucketOp::PutJson,
        BucketOp::TryDelete,
        BucketOp::TryGet,
        BucketOp::TryGetJson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketOp::Delete => "delete",
            BucketOp::Exists => "exists",
            BucketOp::Get => "get",
            BucketOp::GetJson => "getJson",
            BucketOp::List => "list",
            BucketOp::PublicUrl => "publicUrl",
            BucketOp::Put => "put",
            BucketOp::PutJson => "putJson",
            BucketOp::TryDelete => "tryDelete",
            BucketOp::TryGet => "tryGet",
            BucketOp::TryGetJson => "tryGetJson",
        }
    }

    /// The permission a consumer needs to call this operation.
    pub fn permission(&self) -> Permission {
        match self {
            BucketOp::Put | BucketOp::PutJson | BucketOp::Delete | BucketOp::TryDelete => {
                Permission::Write
            }
            BucketOp::Exists
            | BucketOp::Get
            | BucketOp::GetJson
            | BucketOp::List
            | BucketOp::PublicUrl
            | BucketOp::TryGet
            | BucketOp::TryGetJson => Permission::Read,
        }
    }
}

impl fmt::Display for BucketOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown operation name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOp(pub String);

impl FromStr for BucketOp {
    type Err = UnknownOp;

    /// Accepts the camelCase contract names and their snake_case spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BucketOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s || snake_case(op.as_str()) == s)
            .ok_or_else(|| UnknownOp(s.to_string()))
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerKind {
    #[default]
    Function,
    Service,
    Website,
}

impl fmt::Display for ConsumerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerKind::Function => f.write_str("function"),
            ConsumerKind::Service => f.write_str("service"),
            ConsumerKind::Website => f.write_str("website"),
        }
    }
}

/// Compute that calls bucket operations at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub id: String,
    pub kind: ConsumerKind,
}

impl Consumer {
    pub fn function(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ConsumerKind::Function,
        }
    }
}

/// Access granted to one consumer on one bucket; computed once per edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingGrant {
    pub consumer: String,
    pub resource: String,
    pub ops: BTreeSet<BucketOp>,
    pub permissions: BTreeSet<Permission>,
    /// Target role names backing `permissions`.
    pub roles: Vec<String>,
    /// Values the consumer reads at startup to build its client.
    pub environment: BTreeMap<String, String>,
}

impl BindingGrant {
    pub fn can_read(&self) -> bool {
        self.permissions.contains(&Permission::Read)
    }

    pub fn can_write(&self) -> bool {
        self.permissions.contains(&Permission::Write)
    }
}

/// Parse declared operation names, failing on the first one the bucket does
/// not expose.
pub fn resolve_ops<S: AsRef<str>>(
    resource: &str,
    consumer: &Consumer,
    ops: &[S],
) -> Result<BTreeSet<BucketOp>, SynthError> {
    ops.iter()
        .map(|op| {
            op.as_ref()
                .parse::<BucketOp>()
                .map_err(|UnknownOp(op)| SynthError::UnsupportedOperation {
                    resource: resource.to_string(),
                    op,
                    consumer: consumer.id.clone(),
                })
        })
        .collect()
}

/// Union of the permissions implied by `ops`.
pub fn required_permissions(ops: &BTreeSet<BucketOp>) -> BTreeSet<Permission> {
    ops.iter().map(BucketOp::permission).collect()
}
