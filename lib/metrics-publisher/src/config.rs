//! Publisher configuration.

use std::time::Duration;

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::Deserialize;
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, warn};

/// Minimum, and default, HTTP timeout for AWS API calls.
pub const MIN_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default instance metadata service endpoint.
pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254";

const fn default_publish_interval_secs() -> u64 {
    60
}

fn default_imds_endpoint() -> String {
    DEFAULT_IMDS_ENDPOINT.to_string()
}

const NUMERIC_ENVIRONMENT_KEYS: &[&str] = &["HTTP_TIMEOUT", "PUBLISH_INTERVAL"];

// Taken verbatim: `0123` is a valid cluster name and `1.10` a valid version.
const TEXT_ENVIRONMENT_KEYS: &[&str] = &[
    "AWS_EC2_ENDPOINT",
    "AWS_EC2_METADATA_SERVICE_ENDPOINT",
    "AWS_REGION",
    "CLUSTER_NAME",
    "VPC_CNI_VERSION",
];

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// The configuration could not be extracted from its sources.
    #[snafu(display("Failed to load configuration: {}", source))]
    Load {
        /// Error source.
        source: figment::Error,
    },

    /// The publish interval was zero.
    #[snafu(display("Publish interval must be greater than zero seconds."))]
    ZeroPublishInterval,
}

// Environment variables are parsed into their most likely type, so "12" arrives as a number and "abc" as a string. We
// want to accept either, and decide what to do with garbage ourselves.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum RawTimeout {
    Seconds(i64),
    Text(String),
}

/// Publisher configuration.
///
/// All settings are read once at startup and fixed for the lifetime of the publisher.
#[derive(Clone, Debug, Deserialize)]
pub struct PublisherConfiguration {
    /// Region to publish metrics to.
    ///
    /// When unset, the region is resolved from the instance metadata service.
    #[serde(rename = "aws_region", default)]
    region: Option<String>,

    /// Cluster identifier attached to every data point.
    ///
    /// When unset, the identifier is resolved from the instance tags.
    #[serde(rename = "cluster_name", default)]
    cluster_id: Option<String>,

    /// Flush interval, in seconds.
    ///
    /// Defaults to 60 seconds.
    #[serde(rename = "publish_interval", default = "default_publish_interval_secs")]
    publish_interval_secs: u64,

    #[serde(rename = "http_timeout", default)]
    raw_http_timeout: Option<RawTimeout>,

    /// Custom EC2 API endpoint.
    #[serde(rename = "aws_ec2_endpoint", default)]
    ec2_endpoint: Option<String>,

    /// Instance metadata service endpoint.
    ///
    /// Defaults to `http://169.254.169.254`.
    #[serde(rename = "aws_ec2_metadata_service_endpoint", default = "default_imds_endpoint")]
    imds_endpoint: String,

    /// Version reported in the user agent of AWS API calls.
    #[serde(rename = "vpc_cni_version", default)]
    version: String,
}

impl PublisherConfiguration {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// If an environment variable holds a value of the wrong type, or the publish interval is zero, an error is
    /// returned.
    pub fn from_environment() -> Result<Self, ConfigurationError> {
        let text_values = Env::raw().only(TEXT_ENVIRONMENT_KEYS);
        let figment = text_values
            .iter()
            .fold(Figment::new().merge(Env::raw().only(NUMERIC_ENVIRONMENT_KEYS)), |figment, (key, value)| {
                figment.merge(Serialized::default(key.as_str(), value))
            });

        Self::from_figment(figment)
    }

    /// Loads the configuration from the given figment.
    ///
    /// # Errors
    ///
    /// If a value has the wrong type, or the publish interval is zero, an error is returned.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigurationError> {
        let config = figment.extract::<Self>().context(Load)?;
        if config.publish_interval_secs == 0 {
            return Err(ConfigurationError::ZeroPublishInterval);
        }

        debug!(?config, "Loaded publisher configuration.");
        Ok(config)
    }

    /// Sets an explicit region, bypassing region resolution.
    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets an explicit cluster identifier, bypassing cluster identifier resolution.
    pub fn with_cluster_id<S: Into<String>>(mut self, cluster_id: S) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    /// Returns the explicitly configured region, if any.
    ///
    /// Empty values are treated as unset.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns the explicitly configured cluster identifier, if any.
    ///
    /// Empty values are treated as unset.
    pub fn cluster_id(&self) -> Option<&str> {
        self.cluster_id.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns the flush interval, in seconds.
    pub const fn publish_interval_secs(&self) -> u64 {
        self.publish_interval_secs
    }

    /// Returns the HTTP timeout for AWS API calls.
    ///
    /// Values below 10 seconds, or values that aren't a whole number of seconds, are rejected in favor of the 10 second
    /// default.
    pub fn http_timeout(&self) -> Duration {
        let secs = match &self.raw_http_timeout {
            Some(RawTimeout::Seconds(secs)) => Some(*secs),
            Some(RawTimeout::Text(text)) => text.trim().parse::<i64>().ok(),
            None => None,
        };

        match secs {
            Some(secs) if secs >= MIN_HTTP_TIMEOUT.as_secs() as i64 => {
                debug!(http_timeout_secs = secs, "Using configured HTTP timeout.");
                Duration::from_secs(secs as u64)
            }
            _ => {
                warn!("HTTP_TIMEOUT is not set or set to less than 10 seconds, defaulting to 10 seconds.");
                MIN_HTTP_TIMEOUT
            }
        }
    }

    /// Returns the custom EC2 API endpoint, if any.
    pub fn ec2_endpoint(&self) -> Option<&str> {
        self.ec2_endpoint.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns the instance metadata service endpoint.
    pub fn imds_endpoint(&self) -> &str {
        &self.imds_endpoint
    }

    /// Returns the version reported in the user agent.
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Default for PublisherConfiguration {
    fn default() -> Self {
        Self {
            region: None,
            cluster_id: None,
            publish_interval_secs: default_publish_interval_secs(),
            raw_http_timeout: None,
            ec2_endpoint: None,
            imds_endpoint: default_imds_endpoint(),
            version: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    fn config_with<V: serde::Serialize>(key: &str, value: V) -> Result<PublisherConfiguration, ConfigurationError> {
        PublisherConfiguration::from_figment(Figment::new().merge(Serialized::default(key, value)))
    }

    #[test]
    fn defaults() {
        let config = PublisherConfiguration::from_figment(Figment::new()).unwrap();

        assert_eq!(config.region(), None);
        assert_eq!(config.cluster_id(), None);
        assert_eq!(config.publish_interval_secs(), 60);
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.ec2_endpoint(), None);
        assert_eq!(config.imds_endpoint(), "http://169.254.169.254");
    }

    #[test]
    fn http_timeout_below_floor_uses_default() {
        let config = config_with("http_timeout", 2).unwrap();
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn http_timeout_above_floor_is_used() {
        let config = config_with("http_timeout", 12).unwrap();
        assert_eq!(config.http_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn http_timeout_as_text() {
        assert_eq!(config_with("http_timeout", "15").unwrap().http_timeout(), Duration::from_secs(15));
        assert_eq!(config_with("http_timeout", "soon").unwrap().http_timeout(), Duration::from_secs(10));
        assert_eq!(config_with("http_timeout", -30).unwrap().http_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn ec2_endpoint_override() {
        let config = config_with("aws_ec2_endpoint", "https://ec2.us-west-2.customaws.com").unwrap();
        assert_eq!(config.ec2_endpoint(), Some("https://ec2.us-west-2.customaws.com"));
    }

    #[test]
    fn empty_region_is_unset() {
        let config = config_with("aws_region", "").unwrap();
        assert_eq!(config.region(), None);

        let config = config.with_region("eu-west-1");
        assert_eq!(config.region(), Some("eu-west-1"));
    }

    #[test]
    fn environment_text_values_are_kept_verbatim() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("CLUSTER_NAME", "0123");
            jail.set_env("VPC_CNI_VERSION", "1.10");
            jail.set_env("AWS_REGION", "us-west-2");
            jail.set_env("PUBLISH_INTERVAL", "30");
            jail.set_env("HTTP_TIMEOUT", "15");

            let config = PublisherConfiguration::from_environment().unwrap();
            assert_eq!(config.cluster_id(), Some("0123"));
            assert_eq!(config.version(), "1.10");
            assert_eq!(config.region(), Some("us-west-2"));
            assert_eq!(config.publish_interval_secs(), 30);
            assert_eq!(config.http_timeout(), Duration::from_secs(15));
            Ok(())
        });
    }

    #[test]
    fn environment_publish_interval_must_be_numeric() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("PUBLISH_INTERVAL", "often");

            assert!(matches!(
                PublisherConfiguration::from_environment(),
                Err(ConfigurationError::Load { .. })
            ));
            Ok(())
        });
    }

    #[test]
    fn zero_publish_interval_is_rejected() {
        assert!(matches!(
            config_with("publish_interval", 0),
            Err(ConfigurationError::ZeroPublishInterval)
        ));
    }

    #[test]
    fn publish_interval_wrong_type_is_rejected() {
        assert!(matches!(
            config_with("publish_interval", "often"),
            Err(ConfigurationError::Load { .. })
        ));
    }
}
