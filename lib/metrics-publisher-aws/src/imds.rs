use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use metrics_publisher::{
    config::PublisherConfiguration,
    providers::{InstanceIdentity, InstanceIdentityProvider},
    GenericError,
};
use tokio::sync::OnceCell;
use tracing::debug;

const TOKEN_PATH: &str = "/latest/api/token";
const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const TOKEN_TTL_SECS: u32 = 21_600;
const REGION_PATH: &str = "/latest/meta-data/placement/region";
const IDENTITY_DOCUMENT_PATH: &str = "/latest/dynamic/instance-identity/document";

/// Instance metadata service (IMDSv2) client.
///
/// Every request is authenticated with a freshly acquired session token. The instance identity document never changes
/// for the lifetime of an instance, so it is fetched once and cached.
pub struct ImdsClient {
    client: reqwest::Client,
    endpoint: String,
    cached_identity: OnceCell<InstanceIdentity>,
}

impl ImdsClient {
    /// Creates a new `ImdsClient` for the given endpoint.
    ///
    /// # Errors
    ///
    /// If the underlying HTTP client cannot be created, an error is returned.
    pub fn new<E: Into<String>>(endpoint: E, timeout: Duration) -> Result<Self, GenericError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build IMDS HTTP client.")?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cached_identity: OnceCell::new(),
        })
    }

    /// Creates a new `ImdsClient` from the given configuration.
    ///
    /// # Errors
    ///
    /// If the underlying HTTP client cannot be created, an error is returned.
    pub fn from_configuration(config: &PublisherConfiguration) -> Result<Self, GenericError> {
        Self::new(config.imds_endpoint(), config.http_timeout())
    }

    async fn acquire_token(&self) -> Result<String, GenericError> {
        let response = self
            .client
            .put(format!("{}{}", self.endpoint, TOKEN_PATH))
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS.to_string())
            .send()
            .await
            .context("Failed to request IMDS session token.")?
            .error_for_status()
            .context("IMDS refused to issue a session token.")?;

        response.text().await.context("Failed to read IMDS session token.")
    }

    async fn get(&self, path: &str) -> Result<String, GenericError> {
        let token = self.acquire_token().await?;

        debug!(path, "Querying instance metadata.");
        let response = self
            .client
            .get(format!("{}{}", self.endpoint, path))
            .header(TOKEN_HEADER, token)
            .send()
            .await
            .with_context(|| format!("Failed to query instance metadata at '{}'.", path))?
            .error_for_status()
            .with_context(|| format!("Instance metadata query for '{}' failed.", path))?;

        response
            .text()
            .await
            .with_context(|| format!("Failed to read instance metadata at '{}'.", path))
    }

    async fn fetch_instance_identity(&self) -> Result<InstanceIdentity, GenericError> {
        let document = self.get(IDENTITY_DOCUMENT_PATH).await?;
        serde_json::from_str(&document).context("Failed to parse instance identity document.")
    }
}

#[async_trait]
impl InstanceIdentityProvider for ImdsClient {
    async fn get_region(&self) -> Result<String, GenericError> {
        let region = self.get(REGION_PATH).await?.trim().to_string();
        if region.is_empty() {
            anyhow::bail!("Instance metadata returned an empty region.");
        }

        Ok(region)
    }

    async fn get_instance_identity(&self) -> Result<InstanceIdentity, GenericError> {
        self.cached_identity
            .get_or_try_init(|| self.fetch_instance_identity())
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use axum::{
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::{get, put},
        Router,
    };

    use super::*;

    const TOKEN: &str = "AQAEAGvdRkbh";

    const IDENTITY_DOCUMENT: &str = r#"{
        "accountId": "123456789012",
        "availabilityZone": "us-west-2a",
        "imageId": "ami-0a1b2c3d",
        "instanceId": "i-0abc123def456",
        "instanceType": "m5.xlarge",
        "privateIp": "10.0.1.20",
        "region": "us-west-2"
    }"#;

    fn authorized(headers: &HeaderMap, body: &'static str) -> Response {
        match headers.get(TOKEN_HEADER) {
            Some(value) if value.as_bytes() == TOKEN.as_bytes() => (StatusCode::OK, body).into_response(),
            _ => StatusCode::UNAUTHORIZED.into_response(),
        }
    }

    async fn spawn_fake_imds(region: &'static str, document_hits: Arc<AtomicUsize>) -> String {
        let app = Router::new()
            .route(
                TOKEN_PATH,
                put(|headers: HeaderMap| async move {
                    if headers.contains_key(TOKEN_TTL_HEADER) {
                        (StatusCode::OK, TOKEN).into_response()
                    } else {
                        StatusCode::BAD_REQUEST.into_response()
                    }
                }),
            )
            .route(
                REGION_PATH,
                get(move |headers: HeaderMap| async move { authorized(&headers, region) }),
            )
            .route(
                IDENTITY_DOCUMENT_PATH,
                get(move |headers: HeaderMap| {
                    document_hits.fetch_add(1, Ordering::SeqCst);
                    async move { authorized(&headers, IDENTITY_DOCUMENT) }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn region_from_metadata() {
        let endpoint = spawn_fake_imds("us-west-2\n", Arc::default()).await;
        let client = ImdsClient::new(endpoint, Duration::from_secs(5)).unwrap();

        assert_eq!(client.get_region().await.unwrap(), "us-west-2");
    }

    #[tokio::test]
    async fn empty_region_is_an_error() {
        let endpoint = spawn_fake_imds("", Arc::default()).await;
        let client = ImdsClient::new(endpoint, Duration::from_secs(5)).unwrap();

        assert!(client.get_region().await.is_err());
    }

    #[tokio::test]
    async fn identity_document_is_cached() {
        let document_hits = Arc::new(AtomicUsize::new(0));
        let endpoint = spawn_fake_imds("us-west-2", Arc::clone(&document_hits)).await;
        let client = ImdsClient::new(endpoint, Duration::from_secs(5)).unwrap();

        let identity = client.get_instance_identity().await.unwrap();
        assert_eq!(identity.instance_id, "i-0abc123def456");
        assert_eq!(identity.region, "us-west-2");

        let again = client.get_instance_identity().await.unwrap();
        assert_eq!(again, identity);
        assert_eq!(document_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ImdsClient::new(format!("http://{}", addr), Duration::from_secs(1)).unwrap();
        assert!(client.get_region().await.is_err());
        assert!(client.get_instance_identity().await.is_err());
    }
}
