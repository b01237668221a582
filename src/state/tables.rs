use redb::TableDefinition;

/// Deployment metadata: key -> value (e.g. `lineage`)
pub const METADATA: TableDefinition<&str, &str> = TableDefinition::new("metadata");

/// Uniqueness suffixes: resource id -> SuffixRecord (msgpack)
pub const UNIQUE_SUFFIXES: TableDefinition<&str, &[u8]> = TableDefinition::new("unique_suffixes");
