mod admin;
mod objects;

use crate::api::response::ApiError;
use crate::client::SimBucketClient;
use crate::AppState;

pub use admin::{admin_purge, health, list_buckets};
pub use objects::{delete_object, get_object, list_objects, object_exists, put_object};

/// Resolve a simulated bucket by name into a client.
async fn bucket_client(state: &AppState, bucket: &str) -> Result<SimBucketClient, ApiError> {
    let store = state
        .registry
        .get(bucket)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Bucket {bucket} not found")))?;
    Ok(SimBucketClient::new(bucket, false, store))
}
