//! Contract checks every `BucketClient` backend must pass.

#![allow(dead_code)]

pub mod fake_gcs;

use async_trait::async_trait;
use cloud_bucket::client::{BucketClient, BucketError, DeleteOptions};
use serde_json::json;

pub async fn check_absent_keys(client: &dyn BucketClient) {
    assert!(!client.exists("KEY").await.unwrap());
    assert!(matches!(
        client.get("KEY").await,
        Err(BucketError::NotFound(ref key)) if key == "KEY"
    ));
    assert_eq!(client.try_get("KEY").await.unwrap(), None);
    assert_eq!(client.try_get_json("KEY").await.unwrap(), None);
}

pub async fn check_read_after_write(client: &dyn BucketClient) {
    client.put("KEY", "VALUE").await.unwrap();
    assert!(client.exists("KEY").await.unwrap());
    assert_eq!(client.get("KEY").await.unwrap(), "VALUE");
    assert_eq!(client.try_get("KEY").await.unwrap().as_deref(), Some("VALUE"));

    client.put("KEY", "OTHER").await.unwrap();
    assert_eq!(client.get("KEY").await.unwrap(), "OTHER");
}

pub async fn check_json_round_trip(client: &dyn BucketClient) {
    let value = json!({ "cool": "beans" });
    client.put_json("KEY", &value).await.unwrap();
    assert_eq!(client.get_json("KEY").await.unwrap(), value);

    let nested = json!({ "n": 1.5, "list": [1, "two", null, true], "obj": { "a": {} } });
    client.put_json("nested.json", &nested).await.unwrap();
    assert_eq!(client.try_get_json("nested.json").await.unwrap(), Some(nested));
}

pub async fn check_invalid_json(client: &dyn BucketClient) {
    client.put("broken", "not-json").await.unwrap();
    assert!(client.exists("broken").await.unwrap());

    let err = client.get_json("broken").await.unwrap_err();
    assert!(matches!(err, BucketError::Parse { ref key, .. } if key == "broken"));

    // Present but unparseable is still an error for try_get_json
    assert!(matches!(
        client.try_get_json("broken").await,
        Err(BucketError::Parse { .. })
    ));
}

pub async fn check_delete(client: &dyn BucketClient) {
    client.delete("never-written", DeleteOptions::default()).await.unwrap();

    let err = client
        .delete("never-written", DeleteOptions::must_exist())
        .await
        .unwrap_err();
    assert!(matches!(err, BucketError::NotFound(_)));

    client.put("doomed", "x").await.unwrap();
    client.delete("doomed", DeleteOptions::must_exist()).await.unwrap();
    assert!(!client.exists("doomed").await.unwrap());

    client.put("doomed", "x").await.unwrap();
    client.delete("doomed", DeleteOptions::default()).await.unwrap();
    assert!(!client.exists("doomed").await.unwrap());
}

pub async fn check_try_delete(client: &dyn BucketClient) {
    assert!(!client.try_delete("gone").await.unwrap());

    client.put("gone", "x").await.unwrap();
    assert!(client.try_delete("gone").await.unwrap());
    assert!(!client.exists("gone").await.unwrap());
    assert!(!client.try_delete("gone").await.unwrap());
}

pub async fn check_list(client: &dyn BucketClient) {
    for key in ["images/a.png", "images/b.png", "imagesX", "docs/readme.txt"] {
        client.put(key, "x").await.unwrap();
    }

    let mut images = client.list(Some("images/")).await.unwrap();
    images.sort();
    assert_eq!(images, vec!["images/a.png", "images/b.png"]);

    let mut starts_with_images = client.list(Some("images")).await.unwrap();
    starts_with_images.sort();
    assert_eq!(
        starts_with_images,
        vec!["images/a.png", "images/b.png", "imagesX"]
    );

    assert!(client.list(Some("videos/")).await.unwrap().is_empty());

    let mut all = client.list(None).await.unwrap();
    all.sort();
    assert_eq!(
        all,
        vec!["docs/readme.txt", "images/a.png", "images/b.png", "imagesX"]
    );
}

pub async fn check_public_url_unsupported(client: &dyn BucketClient) {
    let err = client.public_url("KEY").await.unwrap_err();
    assert!(matches!(err, BucketError::Unsupported(_)));
    assert_eq!(err.to_string(), "publicUrl is not supported yet. (key=KEY)");
}

/// Wraps a client so `exists` reports `stale_key` as present even though the
/// inner store lacks it, as when another writer deletes the object between
/// the check and the read.
pub struct StaleExists<'a> {
    pub inner: &'a dyn BucketClient,
    pub stale_key: &'a str,
}

#[async_trait]
impl BucketClient for StaleExists<'_> {
    async fn exists(&self, key: &str) -> Result<bool, BucketError> {
        if key == self.stale_key {
            return Ok(true);
        }
        self.inner.exists(key).await
    }

    async fn put(&self, key: &str, body: &str) -> Result<(), BucketError> {
        self.inner.put(key, body).await
    }

    async fn get(&self, key: &str) -> Result<String, BucketError> {
        self.inner.get(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), BucketError> {
        self.inner.remove(key).await
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, BucketError> {
        self.inner.list(prefix).await
    }
}

/// `try_*` check then act in two calls; an object removed in between
/// surfaces from the second call.
pub async fn check_try_after_concurrent_delete(client: &dyn BucketClient) {
    let racing = StaleExists {
        inner: client,
        stale_key: "vanished",
    };

    assert!(matches!(
        racing.try_get("vanished").await,
        Err(BucketError::NotFound(ref key)) if key == "vanished"
    ));
    assert!(matches!(
        racing.try_get_json("vanished").await,
        Err(BucketError::NotFound(_))
    ));

    // The delete itself tolerates absence, so the key is reported deleted
    assert!(racing.try_delete("vanished").await.unwrap());
    assert!(!client.exists("vanished").await.unwrap());
}
