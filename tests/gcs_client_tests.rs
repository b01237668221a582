mod common;

use cloud_bucket::client::{BucketClient, BucketError, DeleteOptions, GcsAuth, GcsBucketClient};
use cloud_bucket::target::{BucketLocator, GcpTarget, Target};

use common::fake_gcs::{FakeGcs, BROKEN_BUCKET, TOKEN};

const BUCKET: &str = "test-bucket";

async fn client_for(fake: &FakeGcs, bucket: &str, token: &str) -> GcsBucketClient {
    GcsBucketClient::new(
        bucket,
        false,
        GcsAuth::Static(token.to_string()),
        Some(fake.endpoint()),
    )
    .await
    .unwrap()
}

async fn setup() -> (FakeGcs, GcsBucketClient) {
    let fake = FakeGcs::start(&[BUCKET]).await;
    let client = client_for(&fake, BUCKET, TOKEN).await;
    (fake, client)
}

#[tokio::test]
async fn test_absent_keys() {
    let (_fake, client) = setup().await;
    common::check_absent_keys(&client).await;
}

#[tokio::test]
async fn test_put_then_get() {
    let (_fake, client) = setup().await;
    common::check_read_after_write(&client).await;
}

#[tokio::test]
async fn test_json_round_trip() {
    let (_fake, client) = setup().await;
    common::check_json_round_trip(&client).await;
}

#[tokio::test]
async fn test_get_json_on_invalid_content() {
    let (_fake, client) = setup().await;
    common::check_invalid_json(&client).await;
}

#[tokio::test]
async fn test_delete_options() {
    let (_fake, client) = setup().await;
    common::check_delete(&client).await;
}

#[tokio::test]
async fn test_try_delete() {
    let (_fake, client) = setup().await;
    common::check_try_delete(&client).await;
}

#[tokio::test]
async fn test_try_ops_after_concurrent_delete() {
    let (_fake, client) = setup().await;
    common::check_try_after_concurrent_delete(&client).await;
}

#[tokio::test]
async fn test_list_by_prefix() {
    let (_fake, client) = setup().await;
    common::check_list(&client).await;
}

#[tokio::test]
async fn test_public_url_is_unsupported() {
    let (_fake, client) = setup().await;
    common::check_public_url_unsupported(&client).await;
}

#[tokio::test]
async fn test_list_follows_page_tokens() {
    let (_fake, client) = setup().await;
    for i in 0..5 {
        client.put(&format!("page/{i}"), "x").await.unwrap();
    }
    client.put("other", "x").await.unwrap();

    let keys = client.list(Some("page/")).await.unwrap();
    assert_eq!(keys, vec!["page/0", "page/1", "page/2", "page/3", "page/4"]);
    assert_eq!(client.list(None).await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_keys_with_slashes_and_spaces() {
    let (fake, client) = setup().await;
    client.put("dir/file name.txt", "hello").await.unwrap();

    assert!(client.exists("dir/file name.txt").await.unwrap());
    assert!(!client.exists("dir").await.unwrap());
    assert_eq!(client.get("dir/file name.txt").await.unwrap(), "hello");
    assert_eq!(client.list(Some("dir/")).await.unwrap(), vec!["dir/file name.txt"]);

    client.delete("dir/file name.txt", DeleteOptions::must_exist()).await.unwrap();
    assert_eq!(fake.object_count(BUCKET).await, 0);
}

#[tokio::test]
async fn test_upload_sets_content_type_from_key() {
    let (fake, client) = setup().await;
    client.put_json("config.json", &serde_json::json!({ "a": 1 })).await.unwrap();
    client.put("notes.txt", "hi").await.unwrap();

    assert_eq!(
        fake.content_type(BUCKET, "config.json").await.as_deref(),
        Some("application/json")
    );
    assert_eq!(
        fake.content_type(BUCKET, "notes.txt").await.as_deref(),
        Some("text/plain")
    );
}

#[tokio::test]
async fn test_server_errors_are_transport_errors() {
    let fake = FakeGcs::start(&[BUCKET]).await;
    let client = client_for(&fake, BROKEN_BUCKET, TOKEN).await;

    assert!(matches!(client.exists("KEY").await, Err(BucketError::Transport(_))));
    assert!(matches!(client.get("KEY").await, Err(BucketError::Transport(_))));
    assert!(matches!(client.try_get("KEY").await, Err(BucketError::Transport(_))));
    assert!(matches!(client.list(None).await, Err(BucketError::Transport(_))));

    // Only absence is tolerated; a failing backend is not.
    let err = client
        .delete("KEY", DeleteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BucketError::Transport(ref msg) if msg.contains("500")));
}

#[tokio::test]
async fn test_rejected_token_is_a_transport_error() {
    let fake = FakeGcs::start(&[BUCKET]).await;
    let client = client_for(&fake, BUCKET, "wrong-token").await;

    let err = client.put("KEY", "VALUE").await.unwrap_err();
    assert!(matches!(err, BucketError::Transport(ref msg) if msg.contains("401")));
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let fake = FakeGcs::start(&[BUCKET]).await;
    let client = GcsBucketClient::new(
        BUCKET,
        false,
        GcsAuth::TokenEndpoint(fake.token_url()),
        Some(fake.endpoint()),
    )
    .await
    .unwrap();
    client.put("KEY", "VALUE").await.unwrap();

    fake.rotate_token().await;
    assert_eq!(client.get("KEY").await.unwrap(), "VALUE");
    client.put("KEY", "NEW").await.unwrap();

    fake.rotate_token().await;
    assert_eq!(client.list(None).await.unwrap(), vec!["KEY"]);
    assert!(client.exists("KEY").await.unwrap());
    client.delete("KEY", DeleteOptions::must_exist()).await.unwrap();
    assert_eq!(fake.object_count(BUCKET).await, 0);
}

#[tokio::test]
async fn test_missing_bucket_is_not_an_absent_key() {
    let fake = FakeGcs::start(&[BUCKET]).await;
    let client = client_for(&fake, "deprovisioned", TOKEN).await;

    assert!(matches!(client.exists("KEY").await, Err(BucketError::Transport(_))));
    assert!(matches!(client.try_get("KEY").await, Err(BucketError::Transport(_))));
    let err = client.get("KEY").await.unwrap_err();
    assert!(matches!(err, BucketError::Transport(ref msg) if msg.contains("bucket does not exist")));

    let err = client
        .delete("KEY", DeleteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BucketError::Transport(_)));
}

#[tokio::test]
async fn test_gcp_target_client_from_locator() {
    let fake = FakeGcs::start(&[BUCKET]).await;
    let target = GcpTarget::new("my-project", "US")
        .with_auth(GcsAuth::Static(TOKEN.to_string()))
        .with_endpoint(fake.endpoint());

    let locator = BucketLocator {
        bucket_name: BUCKET.to_string(),
        public: false,
    };
    let client = target.make_client(&locator).await.unwrap();
    client.put("KEY", "VALUE").await.unwrap();
    assert_eq!(client.get("KEY").await.unwrap(), "VALUE");
    assert_eq!(fake.object_count(BUCKET).await, 1);
}
