use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A random suffix generated once for a resource and reused on every
/// subsequent synthesis of the same deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixRecord {
    pub resource: String,
    pub byte_length: usize,
    /// Lowercase hex, two characters per byte.
    pub hex: String,
    pub created_at: DateTime<Utc>,
}
