use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use aws_sdk_ec2::{types::Filter, Client};
use metrics_publisher::{
    providers::{InstanceIdentityProvider, InstanceTagProvider},
    GenericError,
};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::session::AwsSession;

/// Instance tag provider backed by the EC2 `DescribeTags` API.
///
/// The EC2 client is created on first use, in the region reported by the given identity provider.
pub struct Ec2TagProvider {
    identity: Arc<dyn InstanceIdentityProvider + Send + Sync>,
    session: AwsSession,
    client: OnceCell<Client>,
}

impl Ec2TagProvider {
    /// Creates a new `Ec2TagProvider`.
    pub fn new(identity: Arc<dyn InstanceIdentityProvider + Send + Sync>, session: AwsSession) -> Self {
        Self {
            identity,
            session,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client, GenericError> {
        self.client
            .get_or_try_init(|| async {
                let region = self
                    .identity
                    .get_region()
                    .await
                    .context("Failed to determine region for EC2 client.")?;

                let sdk_config = self.session.load(&region).await;
                debug!(region = %region, "Created EC2 client.");
                Ok::<_, GenericError>(Client::from_conf(self.session.ec2_config(&sdk_config)))
            })
            .await
    }
}

#[async_trait]
impl InstanceTagProvider for Ec2TagProvider {
    async fn get_tag_value(&self, instance_id: &str, key: &str) -> Result<String, GenericError> {
        let client = self.client().await?;
        describe_tag_value(client, instance_id, key).await
    }
}

async fn describe_tag_value(client: &Client, instance_id: &str, key: &str) -> Result<String, GenericError> {
    let output = client
        .describe_tags()
        .filters(Filter::builder().name("resource-id").values(instance_id).build())
        .filters(Filter::builder().name("key").values(key).build())
        .send()
        .await
        .with_context(|| format!("Failed to describe tag '{}' of instance '{}'.", key, instance_id))?;

    output
        .tags()
        .first()
        .and_then(|tag| tag.value())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Tag '{}' not found on instance '{}'.", key, instance_id))
}
