//! Collaborator interfaces.
//!
//! The publisher never talks to the network directly: region and instance identity come from an
//! [`InstanceIdentityProvider`], instance tags from an [`InstanceTagProvider`], and submission goes through a
//! [`MetricsTransport`]. Credentials, retries, and timeouts are the business of the implementations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{datapoint::MetricDatapoint, error::GenericError};

/// Identity of the instance the publisher runs on.
///
/// Field names follow the instance identity document, so this can be deserialized from it directly.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceIdentity {
    pub instance_id: String,
    pub region: String,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub private_ip: String,
    #[serde(default)]
    pub image_id: String,
}

/// Provides the identity of the current instance.
#[async_trait]
pub trait InstanceIdentityProvider {
    /// Gets the region the instance runs in.
    async fn get_region(&self) -> Result<String, GenericError>;

    /// Gets the identity of the instance.
    async fn get_instance_identity(&self) -> Result<InstanceIdentity, GenericError>;
}

#[async_trait]
impl<T> InstanceIdentityProvider for Arc<T>
where
    T: InstanceIdentityProvider + Send + Sync + ?Sized,
{
    async fn get_region(&self) -> Result<String, GenericError> {
        self.as_ref().get_region().await
    }

    async fn get_instance_identity(&self) -> Result<InstanceIdentity, GenericError> {
        self.as_ref().get_instance_identity().await
    }
}

/// Provides tag values for an instance.
#[async_trait]
pub trait InstanceTagProvider {
    /// Gets the value of the tag with the given key on the given instance.
    ///
    /// # Errors
    ///
    /// If the tag lookup fails, or no tag with the given key exists, an error is returned.
    async fn get_tag_value(&self, instance_id: &str, key: &str) -> Result<String, GenericError>;
}

#[async_trait]
impl<T> InstanceTagProvider for Arc<T>
where
    T: InstanceTagProvider + Send + Sync + ?Sized,
{
    async fn get_tag_value(&self, instance_id: &str, key: &str) -> Result<String, GenericError> {
        self.as_ref().get_tag_value(instance_id, key).await
    }
}

/// Submits metric data to the metrics backend.
#[async_trait]
pub trait MetricsTransport {
    /// Submits a single chunk of data points under the given namespace.
    ///
    /// Callers are responsible for keeping chunks within the backend's per-request limit. The data points are consumed
    /// whether or not the submission succeeds.
    async fn submit_batch(&self, namespace: &str, points: Vec<MetricDatapoint>) -> Result<(), GenericError>;
}

/// A shared, type-erased metrics transport.
pub type SharedMetricsTransport = Arc<dyn MetricsTransport + Send + Sync>;

/// Builds a metrics transport once the region is known.
#[async_trait]
pub trait TransportBuilder {
    /// Builds a transport that submits to the backend in the given region.
    async fn build(&self, region: &str) -> Result<SharedMetricsTransport, GenericError>;
}

/// The set of collaborators a publisher is constructed from.
#[derive(Clone)]
pub struct Collaborators {
    pub(crate) identity: Arc<dyn InstanceIdentityProvider + Send + Sync>,
    pub(crate) tags: Arc<dyn InstanceTagProvider + Send + Sync>,
    pub(crate) transport: Arc<dyn TransportBuilder + Send + Sync>,
}

impl Collaborators {
    /// Creates a new `Collaborators` from the given providers.
    pub fn new<I, T, B>(identity: I, tags: T, transport: B) -> Self
    where
        I: InstanceIdentityProvider + Send + Sync + 'static,
        T: InstanceTagProvider + Send + Sync + 'static,
        B: TransportBuilder + Send + Sync + 'static,
    {
        Self {
            identity: Arc::new(identity),
            tags: Arc::new(tags),
            transport: Arc::new(transport),
        }
    }
}
