use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::bucket_client;
use crate::api::response::{ApiError, AppQuery, JSend};
use crate::client::{BucketClient, DeleteOptions};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ListObjectsResponse {
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListObjectsParams {
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteObjectParams {
    #[serde(default)]
    pub must_exist: bool,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    AppQuery(params): AppQuery<ListObjectsParams>,
) -> Result<Json<JSend<ListObjectsResponse>>, ApiError> {
    let client = bucket_client(&state, &bucket).await?;
    let keys = client.list(params.prefix.as_deref()).await?;
    Ok(JSend::success(ListObjectsResponse { keys }))
}

/// Serve raw object content.
/// Route: GET /buckets/:bucket/objects/*key
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let client = bucket_client(&state, &bucket).await?;
    let body = client.get(&key).await?;

    let content_type = mime_guess::from_path(&key)
        .first_raw()
        .unwrap_or("text/plain; charset=utf-8");

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response())
}

pub async fn put_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    body: String,
) -> Result<Json<JSend<()>>, ApiError> {
    if key.is_empty() {
        return Err(ApiError::bad_request("object key must not be empty"));
    }

    let client = bucket_client(&state, &bucket).await?;
    client.put(&key, &body).await?;

    tracing::debug!(%bucket, %key, bytes = body.len(), "Stored object");
    Ok(JSend::success(()))
}

pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    AppQuery(params): AppQuery<DeleteObjectParams>,
) -> Result<Json<JSend<()>>, ApiError> {
    let client = bucket_client(&state, &bucket).await?;
    client
        .delete(
            &key,
            DeleteOptions {
                must_exist: params.must_exist,
            },
        )
        .await?;

    tracing::debug!(%bucket, %key, "Deleted object");
    Ok(JSend::success(()))
}

pub async fn object_exists(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Json<JSend<ExistsResponse>>, ApiError> {
    let client = bucket_client(&state, &bucket).await?;
    let exists = client.exists(&key).await?;
    Ok(JSend::success(ExistsResponse { exists }))
}
