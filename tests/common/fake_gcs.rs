//! In-process fake of the slice of the GCS JSON API the client uses.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::RwLock;

/// The token the fake accepts until `rotate_token` is called.
pub const TOKEN: &str = "test-token";

/// Every request to this bucket fails with a 500.
pub const BROKEN_BUCKET: &str = "broken";

const PAGE_SIZE: usize = 2;

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

struct FakeState {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
    token: RwLock<String>,
    rotations: AtomicUsize,
}

type Shared = Arc<FakeState>;

#[derive(Clone)]
pub struct FakeGcs {
    endpoint: String,
    state: Shared,
}

impl FakeGcs {
    /// Serve the fake on an ephemeral port with the given buckets created.
    pub async fn start(buckets: &[&str]) -> Self {
        let state = Arc::new(FakeState {
            buckets: RwLock::new(
                buckets
                    .iter()
                    .map(|name| (name.to_string(), BTreeMap::new()))
                    .collect(),
            ),
            token: RwLock::new(TOKEN.to_string()),
            rotations: AtomicUsize::new(0),
        });

        let router = Router::new()
            .route("/token", get(issue_token))
            .route("/upload/storage/v1/b/:bucket/o", post(upload))
            .route("/storage/v1/b/:bucket/o", get(list))
            .route(
                "/storage/v1/b/:bucket/o/:object",
                get(read_object).delete(delete_object),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            endpoint: format!("http://{addr}"),
            state,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Metadata-server style token URL handing out the current token.
    pub fn token_url(&self) -> String {
        format!("{}/token", self.endpoint)
    }

    /// Expire the current token; only the new one is accepted from now on.
    pub async fn rotate_token(&self) -> String {
        let n = self.state.rotations.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("{TOKEN}-{n}");
        *self.state.token.write().await = token.clone();
        token
    }

    pub async fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.state
            .buckets
            .read()
            .await
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.content_type.clone())
    }

    pub async fn object_count(&self, bucket: &str) -> usize {
        self.state
            .buckets
            .read()
            .await
            .get(bucket)
            .map(BTreeMap::len)
            .unwrap_or_default()
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": status.as_u16(), "message": message } })),
    )
        .into_response()
}

async fn issue_token(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if headers.get("Metadata-Flavor").and_then(|v| v.to_str().ok()) != Some("Google") {
        return error(StatusCode::FORBIDDEN, "Missing Metadata-Flavor header");
    }
    let token = state.token.read().await.clone();
    Json(json!({ "access_token": token, "expires_in": 3599, "token_type": "Bearer" }))
        .into_response()
}

async fn guard(state: &FakeState, bucket: &str, headers: &HeaderMap) -> Option<Response> {
    let expected = format!("Bearer {}", state.token.read().await);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return Some(error(StatusCode::UNAUTHORIZED, "Invalid Credentials"));
    }
    if bucket == BROKEN_BUCKET {
        return Some(error(StatusCode::INTERNAL_SERVER_ERROR, "backend exploded"));
    }
    if !state.buckets.read().await.contains_key(bucket) {
        return Some(error(StatusCode::NOT_FOUND, "The specified bucket does not exist."));
    }
    None
}

async fn upload(
    State(state): State<Shared>,
    Path(bucket): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(rejection) = guard(&state, &bucket, &headers).await {
        return rejection;
    }
    if params.get("uploadType").map(String::as_str) != Some("media") {
        return error(StatusCode::BAD_REQUEST, "unsupported uploadType");
    }
    let Some(name) = params.get("name").cloned() else {
        return error(StatusCode::BAD_REQUEST, "missing object name");
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let size = body.len();
    state
        .buckets
        .write()
        .await
        .entry(bucket.clone())
        .or_default()
        .insert(
            name.clone(),
            StoredObject {
                data: body,
                content_type,
            },
        );

    Json(json!({ "bucket": bucket, "name": name, "size": size.to_string() })).into_response()
}

async fn list(
    State(state): State<Shared>,
    Path(bucket): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = guard(&state, &bucket, &headers).await {
        return rejection;
    }

    let prefix = params.get("prefix").cloned().unwrap_or_default();
    let offset: usize = params
        .get("pageToken")
        .and_then(|token| token.parse().ok())
        .unwrap_or_default();

    let contents = state.buckets.read().await;
    let names: Vec<&String> = contents
        .get(&bucket)
        .map(|objects| objects.keys().filter(|k| k.starts_with(&prefix)).collect())
        .unwrap_or_default();

    let items: Vec<_> = names
        .iter()
        .skip(offset)
        .take(PAGE_SIZE)
        .map(|name| json!({ "name": name, "bucket": bucket }))
        .collect();

    let mut page = json!({ "kind": "storage#objects" });
    if !items.is_empty() {
        page["items"] = json!(items);
    }
    if offset + PAGE_SIZE < names.len() {
        page["nextPageToken"] = json!((offset + PAGE_SIZE).to_string());
    }
    Json(page).into_response()
}

async fn read_object(
    State(state): State<Shared>,
    Path((bucket, object)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = guard(&state, &bucket, &headers).await {
        return rejection;
    }

    let stored = state
        .buckets
        .read()
        .await
        .get(&bucket)
        .and_then(|objects| objects.get(&object))
        .cloned();
    let Some(stored) = stored else {
        return error(StatusCode::NOT_FOUND, "No such object");
    };

    if params.get("alt").map(String::as_str) == Some("media") {
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, stored.content_type)],
            stored.data,
        )
            .into_response();
    }

    Json(json!({
        "bucket": bucket,
        "name": object,
        "contentType": stored.content_type,
        "size": stored.data.len().to_string(),
    }))
    .into_response()
}

async fn delete_object(
    State(state): State<Shared>,
    Path((bucket, object)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = guard(&state, &bucket, &headers).await {
        return rejection;
    }

    let removed = state
        .buckets
        .write()
        .await
        .get_mut(&bucket)
        .and_then(|objects| objects.remove(&object));
    match removed {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error(StatusCode::NOT_FOUND, "No such object"),
    }
}
