//! AWS implementations of the metrics publisher collaborators.
//!
//! Region and instance identity come from the instance metadata service ([`ImdsClient`]), instance tags from EC2
//! ([`Ec2TagProvider`]), and data points are submitted to CloudWatch ([`CloudWatchTransport`]). All AWS service clients
//! share the settings held by an [`AwsSession`].

mod cloudwatch;
pub use self::cloudwatch::{CloudWatchTransport, CloudWatchTransportBuilder};

mod ec2;
pub use self::ec2::Ec2TagProvider;

mod imds;
pub use self::imds::ImdsClient;

mod session;
pub use self::session::{AwsSession, MAX_ATTEMPTS};
