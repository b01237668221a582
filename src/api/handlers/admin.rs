use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::JSend;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct BucketSummary {
    pub name: String,
    pub objects: usize,
}

#[derive(Debug, Serialize)]
pub struct BucketsResponse {
    pub buckets: Vec<BucketSummary>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub objects_deleted: usize,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn list_buckets(State(state): State<Arc<AppState>>) -> Json<JSend<BucketsResponse>> {
    let mut buckets = Vec::new();
    for name in state.registry.names().await {
        if let Some(store) = state.registry.get(&name).await {
            buckets.push(BucketSummary {
                objects: store.len().await,
                name,
            });
        }
    }
    JSend::success(BucketsResponse { buckets })
}

/// Empty every simulated bucket. Buckets themselves stay provisioned.
pub async fn admin_purge(State(state): State<Arc<AppState>>) -> Json<JSend<PurgeResponse>> {
    let mut objects_deleted = 0;
    for name in state.registry.names().await {
        if let Some(store) = state.registry.get(&name).await {
            objects_deleted += store.clear().await;
        }
    }

    tracing::warn!(objects = objects_deleted, "Purged all simulated buckets");
    JSend::success(PurgeResponse { objects_deleted })
}
