use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, AppName, BehaviorVersion, Region, SdkConfig};
use metrics_publisher::config::PublisherConfiguration;
use tracing::{debug, warn};

/// Maximum number of attempts, including the initial one, for every AWS API call.
pub const MAX_ATTEMPTS: u32 = 10;

const APP_NAME: &str = "metrics-publisher";

/// Shared settings for AWS service clients.
///
/// Every client built from a session uses the same HTTP timeout, the standard retry strategy with up to
/// [`MAX_ATTEMPTS`] attempts, and an application name carrying the deployed version. EC2 clients additionally honor a
/// custom endpoint, if one is configured.
#[derive(Clone, Debug)]
pub struct AwsSession {
    http_timeout: Duration,
    ec2_endpoint: Option<String>,
    version: String,
}

impl AwsSession {
    /// Creates a new `AwsSession` from the given configuration.
    pub fn from_configuration(config: &PublisherConfiguration) -> Self {
        Self {
            http_timeout: config.http_timeout(),
            ec2_endpoint: config.ec2_endpoint().map(str::to_string),
            version: config.version().to_string(),
        }
    }

    /// Returns the HTTP timeout applied to every API call attempt.
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// Returns the custom EC2 endpoint, if any.
    pub fn ec2_endpoint(&self) -> Option<&str> {
        self.ec2_endpoint.as_deref()
    }

    /// Returns the application name reported in the user agent.
    ///
    /// If the version contains characters that aren't allowed in an application name, the version is left out.
    pub fn app_name(&self) -> Option<AppName> {
        if !self.version.is_empty() {
            match AppName::new(format!("{}-{}", APP_NAME, self.version)) {
                Ok(app_name) => return Some(app_name),
                Err(e) => warn!(
                    error = %e,
                    version = %self.version,
                    "Version is not valid in an application name. Omitting it."
                ),
            }
        }

        AppName::new(APP_NAME).ok()
    }

    /// Loads the shared AWS configuration for the given region.
    ///
    /// Credentials are resolved through the default provider chain.
    pub async fn load(&self, region: &str) -> SdkConfig {
        debug!(region, http_timeout = ?self.http_timeout, "Loading AWS configuration.");

        let timeout_config = TimeoutConfig::builder()
            .connect_timeout(self.http_timeout)
            .operation_attempt_timeout(self.http_timeout)
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
            .timeout_config(timeout_config);
        if let Some(app_name) = self.app_name() {
            loader = loader.app_name(app_name);
        }

        loader.load().await
    }

    /// Builds the EC2 service configuration from the given shared configuration.
    pub fn ec2_config(&self, sdk_config: &SdkConfig) -> aws_sdk_ec2::Config {
        let mut builder = aws_sdk_ec2::config::Builder::from(sdk_config);
        if let Some(endpoint) = self.ec2_endpoint.as_deref() {
            debug!(endpoint, "Using custom EC2 endpoint.");
            builder = builder.endpoint_url(endpoint);
        }

        builder.build()
    }
}
