use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use aws_sdk_cloudwatch::{
    primitives::DateTime,
    types::{Dimension as CloudWatchDimension, MetricDatum, StandardUnit},
    Client,
};
use metrics_publisher::{
    providers::{MetricsTransport, SharedMetricsTransport, TransportBuilder},
    GenericError, MetricDatapoint,
};
use tracing::debug;

use crate::session::AwsSession;

/// Metrics transport backed by the CloudWatch `PutMetricData` API.
pub struct CloudWatchTransport {
    client: Client,
}

impl CloudWatchTransport {
    /// Creates a new `CloudWatchTransport` from the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricsTransport for CloudWatchTransport {
    async fn submit_batch(&self, namespace: &str, points: Vec<MetricDatapoint>) -> Result<(), GenericError> {
        let count = points.len();
        let data = points.iter().map(to_metric_datum).collect::<Vec<_>>();

        self.client
            .put_metric_data()
            .namespace(namespace)
            .set_metric_data(Some(data))
            .send()
            .await
            .with_context(|| format!("Failed to put {} data points in namespace '{}'.", count, namespace))?;

        debug!(namespace, count, "Submitted data points.");
        Ok(())
    }
}

/// Builds [`CloudWatchTransport`]s from an [`AwsSession`].
pub struct CloudWatchTransportBuilder {
    session: AwsSession,
}

impl CloudWatchTransportBuilder {
    /// Creates a new `CloudWatchTransportBuilder`.
    pub fn new(session: AwsSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TransportBuilder for CloudWatchTransportBuilder {
    async fn build(&self, region: &str) -> Result<SharedMetricsTransport, GenericError> {
        let sdk_config = self.session.load(region).await;
        if sdk_config.credentials_provider().is_none() {
            return Err(anyhow!("No AWS credentials provider available for region '{}'.", region));
        }

        Ok(Arc::new(CloudWatchTransport::new(Client::new(&sdk_config))))
    }
}

fn to_metric_datum(point: &MetricDatapoint) -> MetricDatum {
    let dimensions = point
        .dimensions()
        .iter()
        .map(|dimension| {
            CloudWatchDimension::builder()
                .name(dimension.name())
                .value(dimension.value())
                .build()
        })
        .collect::<Vec<_>>();

    MetricDatum::builder()
        .metric_name(point.name())
        .value(point.value())
        .unit(StandardUnit::from(point.unit().as_str()))
        .set_timestamp(point.timestamp().map(DateTime::from))
        .set_dimensions(Some(dimensions))
        .build()
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use metrics_publisher::{Dimension, Unit};

    use super::*;

    #[test]
    fn datapoint_conversion() {
        let timestamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let point = MetricDatapoint::new("addReqCount", 3.0)
            .with_unit(Unit::Count)
            .with_timestamp(timestamp)
            .with_dimension(Dimension::new("CLUSTER_ID", "prod-cluster"));

        let datum = to_metric_datum(&point);
        assert_eq!(datum.metric_name(), Some("addReqCount"));
        assert_eq!(datum.value(), Some(3.0));
        assert_eq!(datum.unit(), Some(&StandardUnit::Count));
        assert_eq!(datum.timestamp().map(|t| t.secs()), Some(1_700_000_000));

        let dimensions = datum.dimensions();
        assert_eq!(dimensions.len(), 1);
        assert_eq!(dimensions[0].name(), Some("CLUSTER_ID"));
        assert_eq!(dimensions[0].value(), Some("prod-cluster"));
    }

    #[test]
    fn unit_defaults_to_none() {
        let datum = to_metric_datum(&MetricDatapoint::new("ipamdErr", 1.0));
        assert_eq!(datum.unit(), Some(&StandardUnit::None));
        assert!(datum.timestamp().is_none());
        assert!(datum.dimensions().is_empty());
    }
}
