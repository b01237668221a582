use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;

use super::{BucketClient, BucketError};

pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Where the client gets its OAuth access token from.
#[derive(Debug, Clone)]
pub enum GcsAuth {
    /// Service account key file, exchanged for a token with a signed JWT.
    ServiceAccount(String),
    /// The GCE/Cloud Functions metadata server.
    MetadataServer,
    /// A token URL answering like the metadata server. Used against emulators.
    TokenEndpoint(String),
    /// A pre-issued token. Used against emulators.
    Static(String),
}

/// Google Cloud Storage backend for the bucket client contract.
///
/// The access token is fetched in `new` and fetched again whenever GCS
/// rejects it, so a long-lived client survives token expiry.
pub struct GcsBucketClient {
    bucket: String,
    public: bool,
    endpoint: Url,
    client: Client,
    auth: GcsAuth,
    access_token: tokio::sync::RwLock<String>,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectMetadata>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ObjectMetadata {
    name: String,
}

impl GcsBucketClient {
    pub async fn new(
        bucket: &str,
        public: bool,
        auth: GcsAuth,
        endpoint: Option<&str>,
    ) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;
        let endpoint = Url::parse(endpoint.unwrap_or(DEFAULT_GCS_ENDPOINT))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("GCS endpoint must be an absolute URL: {endpoint}");
        }

        let store = Self {
            bucket: bucket.to_string(),
            public,
            endpoint,
            client,
            auth,
            access_token: tokio::sync::RwLock::new(String::new()),
        };

        store.refresh_token().await?;
        tracing::debug!(bucket = %store.bucket, public = store.public, "GCS client ready");
        Ok(store)
    }

    async fn refresh_token(&self) -> Result<(), anyhow::Error> {
        let token = match &self.auth {
            GcsAuth::ServiceAccount(creds_path) => {
                self.token_from_service_account(creds_path).await?
            }
            GcsAuth::MetadataServer => self.token_from_metadata_server(METADATA_TOKEN_URL).await?,
            GcsAuth::TokenEndpoint(url) => self.token_from_metadata_server(url).await?,
            GcsAuth::Static(token) => token.clone(),
        };

        let mut lock = self.access_token.write().await;
        *lock = token;
        Ok(())
    }

    async fn token_from_service_account(&self, path: &str) -> Result<String, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;

        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    async fn token_from_metadata_server(&self, url: &str) -> Result<String, anyhow::Error> {
        let resp: TokenResponse = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        // Checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn upload_url(&self) -> Url {
        self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"])
    }

    fn objects_url(&self) -> Url {
        self.url(&["storage", "v1", "b", &self.bucket, "o"])
    }

    /// Object names are a single percent-encoded path segment, slashes included.
    fn object_url(&self, key: &str) -> Url {
        self.url(&["storage", "v1", "b", &self.bucket, "o", key])
    }

    async fn token(&self) -> String {
        self.access_token.read().await.clone()
    }

    /// Send the request `build` makes for a token. A 401 refreshes the token
    /// and sends once more; a static token is never retried.
    async fn send<F>(&self, build: F) -> Result<Response, BucketError>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let resp = build(&self.token().await).send().await.map_err(transport)?;
        if resp.status() != StatusCode::UNAUTHORIZED || matches!(self.auth, GcsAuth::Static(_)) {
            return Ok(resp);
        }

        tracing::debug!(bucket = %self.bucket, "Access token rejected, refreshing");
        self.refresh_token()
            .await
            .map_err(|e| BucketError::Transport(format!("Failed to refresh access token: {e}")))?;
        build(&self.token().await).send().await.map_err(transport)
    }
}

#[async_trait]
impl BucketClient for GcsBucketClient {
    async fn exists(&self, key: &str) -> Result<bool, BucketError> {
        let url = self.object_url(key);
        let resp = self
            .send(|token| self.client.get(url.clone()).bearer_auth(token))
            .await?;

        match resp.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => match absent(resp, key).await {
                BucketError::NotFound(_) => Ok(false),
                e => Err(e),
            },
            _ => Err(failure(
                resp,
                &format!("Failed to check if object exists. (key={key})"),
            )
            .await),
        }
    }

    async fn put(&self, key: &str, body: &str) -> Result<(), BucketError> {
        let content_type = mime_guess::from_path(key)
            .first_raw()
            .unwrap_or("text/plain; charset=utf-8");

        let url = self.upload_url();
        let body = Bytes::copy_from_slice(body.as_bytes());
        let resp = self
            .send(|token| {
                self.client
                    .post(url.clone())
                    .query(&[("uploadType", "media"), ("name", key)])
                    .bearer_auth(token)
                    .header("Content-Type", content_type)
                    .body(body.clone())
            })
            .await?;

        if !resp.status().is_success() {
            return Err(failure(resp, "GCS upload failed").await);
        }

        tracing::debug!(bucket = %self.bucket, key, "Uploaded object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, BucketError> {
        let url = self.object_url(key);
        let resp = self
            .send(|token| {
                self.client
                    .get(url.clone())
                    .query(&[("alt", "media")])
                    .bearer_auth(token)
            })
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(absent(resp, key).await);
        }

        if !resp.status().is_success() {
            return Err(failure(resp, "GCS download failed").await);
        }

        let data = resp.bytes().await.map_err(transport)?;
        String::from_utf8(data.to_vec()).map_err(|_| BucketError::InvalidUtf8(key.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), BucketError> {
        let url = self.object_url(key);
        let resp = self
            .send(|token| self.client.delete(url.clone()).bearer_auth(token))
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(absent(resp, key).await);
        }

        if !resp.status().is_success() {
            return Err(failure(resp, "GCS delete failed").await);
        }

        tracing::debug!(bucket = %self.bucket, key, "Deleted object");
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, BucketError> {
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.objects_url();
            let resp = self
                .send(|token| {
                    let mut request = self.client.get(url.clone()).bearer_auth(token);
                    if let Some(prefix) = prefix {
                        request = request.query(&[("prefix", prefix)]);
                    }
                    if let Some(ref page) = page_token {
                        request = request.query(&[("pageToken", page.as_str())]);
                    }
                    request
                })
                .await?;
            if !resp.status().is_success() {
                return Err(failure(resp, "GCS list failed").await);
            }

            let page: ListResponse = resp.json().await.map_err(transport)?;
            keys.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(keys)
    }
}

fn transport(e: reqwest::Error) -> BucketError {
    BucketError::Transport(e.to_string())
}

async fn failure(resp: Response, context: &str) -> BucketError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    BucketError::Transport(format!("{context} ({status}): {body}"))
}

/// GCS answers 404 both for a missing object and for a missing bucket. Only
/// the first is an absent key.
async fn absent(resp: Response, key: &str) -> BucketError {
    let body = resp.text().await.unwrap_or_default();
    if body.to_lowercase().contains("bucket does not exist") {
        BucketError::Transport(format!("GCS bucket does not exist (404): {body}"))
    } else {
        BucketError::NotFound(key.to_string())
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    // PEM body without the BEGIN/END armor
    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &der_b64)?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}
