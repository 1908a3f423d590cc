//! Cluster metrics agent.
//!
//! Resolves the region and cluster identity of the instance it runs on, then publishes a heartbeat metric to CloudWatch
//! on every publish interval until it receives SIGINT or SIGTERM.

#![deny(missing_docs)]

use std::{sync::Arc, time::Duration};

use metrics_publisher::{
    config::PublisherConfiguration,
    providers::{Collaborators, InstanceIdentityProvider},
    GenericError, MetricDatapoint, Publisher, Unit,
};
use metrics_publisher_aws::{AwsSession, CloudWatchTransportBuilder, Ec2TagProvider, ImdsClient};
use tokio::{select, time::interval};
use tracing::{error, info};

mod logging;
use self::logging::initialize_logging;

const HEARTBEAT_METRIC: &str = "agentHeartbeat";

#[tokio::main]
async fn main() {
    if let Err(e) = initialize_logging() {
        eprintln!("FATAL: failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    match run().await {
        Ok(()) => info!("Cluster metrics agent stopped."),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<(), GenericError> {
    let config = PublisherConfiguration::from_environment()?;
    let session = AwsSession::from_configuration(&config);

    let imds: Arc<dyn InstanceIdentityProvider + Send + Sync> = Arc::new(ImdsClient::from_configuration(&config)?);
    let tags = Ec2TagProvider::new(Arc::clone(&imds), session.clone());
    let collaborators = Collaborators::new(imds, tags, CloudWatchTransportBuilder::new(session));

    let publisher = Publisher::from_configuration(&config, collaborators).await?;
    let publish_interval_secs = config.publish_interval_secs();
    publisher.start(publish_interval_secs);

    info!(
        region = publisher.region(),
        cluster_id = publisher.cluster_id(),
        publish_interval_secs,
        "Cluster metrics agent started."
    );

    let mut heartbeat = interval(Duration::from_secs(publish_interval_secs.max(1)));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        select! {
            _ = heartbeat.tick() => {
                publisher.publish([MetricDatapoint::new(HEARTBEAT_METRIC, 1.0).with_unit(Unit::Count)]);
            },
            result = &mut shutdown => {
                result?;
                break;
            }
        }
    }

    publisher.stop();
    Ok(())
}

async fn shutdown_signal() -> Result<(), GenericError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received SIGINT, shutting down...");
            },
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received SIGINT, shutting down...");
    }

    Ok(())
}
