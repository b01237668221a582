//! Physical name generation for synthesized resources.

use ring::digest::{digest, SHA256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseConvention {
    Lowercase,
    Uppercase,
    Preserve,
}

/// Constraints a target imposes on the physical name of a resource.
#[derive(Debug, Clone, Copy)]
pub struct NameOptions {
    pub max_len: usize,
    pub case: CaseConvention,
    /// Characters outside this set are replaced with `sep`.
    pub allowed: fn(char) -> bool,
    /// Append a short hash of the resource id so names from different paths
    /// never collide.
    pub include_hash: bool,
    pub sep: char,
}

const HASH_LEN: usize = 8;

/// Hex SHA-256 of a resource id, truncated to eight characters.
pub fn path_hash(resource_id: &str) -> String {
    let hash = digest(&SHA256, resource_id.as_bytes());
    hex(hash.as_ref())[..HASH_LEN].to_string()
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Derive a physical name from a resource id (or an explicit hint) that
/// satisfies `opts`.
///
/// The base is `hint` when given, else the last segment of `resource_id`.
/// Disallowed characters collapse into single separators. The name starts and
/// ends with an alphanumeric character; when nothing alphanumeric survives,
/// the path hash stands in for the base. The result never exceeds
/// `opts.max_len`.
pub fn generate_name(resource_id: &str, hint: Option<&str>, opts: &NameOptions) -> String {
    let base = hint.unwrap_or_else(|| resource_id.rsplit('/').next().unwrap_or(resource_id));

    let cased = match opts.case {
        CaseConvention::Lowercase => base.to_lowercase(),
        CaseConvention::Uppercase => base.to_uppercase(),
        CaseConvention::Preserve => base.to_string(),
    };

    let mut name = String::with_capacity(cased.len());
    for c in cased.chars() {
        if (opts.allowed)(c) {
            name.push(c);
        } else if !name.ends_with(opts.sep) {
            name.push(opts.sep);
        }
    }

    let hash = match opts.case {
        CaseConvention::Uppercase => path_hash(resource_id).to_uppercase(),
        _ => path_hash(resource_id),
    };
    let suffix = if opts.include_hash {
        hash.clone()
    } else {
        String::new()
    };

    let budget = if suffix.is_empty() {
        opts.max_len
    } else {
        opts.max_len.saturating_sub(suffix.len() + opts.sep.len_utf8())
    };

    let edge = |c: char| !c.is_alphanumeric();
    let mut name: String = name.trim_matches(edge).chars().take(budget).collect();
    let trimmed_len = name.trim_end_matches(edge).len();
    name.truncate(trimmed_len);

    match (name.is_empty(), suffix.is_empty()) {
        (true, true) => hash.chars().take(opts.max_len).collect(),
        (false, true) => name,
        (true, false) => suffix,
        (false, false) => format!("{name}{}{suffix}", opts.sep),
    }
}
