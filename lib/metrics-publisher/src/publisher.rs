use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use snafu::ResultExt as _;
use tokio::{
    select,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn, Instrument as _};

use crate::{
    chunked::ChunkedPublisher,
    cluster::{ClusterIdentityResolver, CLUSTER_ID_TAGS, DEFAULT_CLUSTER_ID},
    config::PublisherConfiguration,
    datapoint::MetricDatapoint,
    error::{PublisherError, RegionUnavailable, TransportUnavailable},
    providers::Collaborators,
    queue::MetricBatchQueue,
    tagger::DimensionTagger,
    telemetry::PublisherTelemetry,
};

enum LifecycleState {
    Created,
    Running(JoinHandle<()>),
    Stopped,
}

/// Batches metric data points and periodically publishes them to the metrics backend.
///
/// A publisher is constructed once, which resolves the region and cluster identifier if they weren't given explicitly.
/// [`start`][Self::start] launches a background task that, on every tick of the publish interval, drains the pending
/// data points and submits them in backend-sized chunks. [`publish`][Self::publish] can be called concurrently from
/// any number of callers, and never fails: data points are tagged and queued, and that's it.
///
/// ## Delivery
///
/// Delivery is best effort. Chunks that fail to submit are dropped, and when the publisher is stopped, data points that
/// have been queued since the last tick are discarded rather than flushed.
pub struct Publisher {
    region: String,
    cluster_id: String,
    tagger: DimensionTagger,
    queue: Arc<MetricBatchQueue>,
    chunked: ChunkedPublisher,
    telemetry: PublisherTelemetry,
    shutdown: CancellationToken,
    state: Mutex<LifecycleState>,
}

impl Publisher {
    /// Creates a new `Publisher`.
    ///
    /// If `cluster_id` is not given, it is resolved from the instance tags, falling back to a default identifier. If
    /// `region` is not given, it is resolved from the instance metadata. Empty values count as not given.
    ///
    /// # Errors
    ///
    /// If the region is not given and cannot be resolved, or if the metrics transport cannot be built for the region,
    /// an error is returned.
    pub async fn new(
        region: Option<&str>, cluster_id: Option<&str>, collaborators: Collaborators,
    ) -> Result<Self, PublisherError> {
        let cluster_id = match cluster_id.filter(|s| !s.is_empty()) {
            Some(cluster_id) => cluster_id.to_string(),
            None => {
                ClusterIdentityResolver::new(&*collaborators.identity, &*collaborators.tags)
                    .resolve_cluster_id(CLUSTER_ID_TAGS, DEFAULT_CLUSTER_ID)
                    .await
            }
        };

        let region = match region.filter(|s| !s.is_empty()) {
            Some(region) => region.to_string(),
            None => collaborators.identity.get_region().await.context(RegionUnavailable)?,
        };

        info!(%region, %cluster_id, "Using region and cluster ID.");

        let transport = collaborators
            .transport
            .build(&region)
            .await
            .context(TransportUnavailable { region: &region })?;

        let telemetry = PublisherTelemetry::new();

        Ok(Self {
            tagger: DimensionTagger::new(&cluster_id),
            region,
            cluster_id,
            queue: Arc::new(MetricBatchQueue::new()),
            chunked: ChunkedPublisher::new(transport, telemetry.clone()),
            telemetry,
            shutdown: CancellationToken::new(),
            state: Mutex::new(LifecycleState::Created),
        })
    }

    /// Creates a new `Publisher` from the given configuration.
    ///
    /// # Errors
    ///
    /// See [`Publisher::new`].
    pub async fn from_configuration(
        config: &PublisherConfiguration, collaborators: Collaborators,
    ) -> Result<Self, PublisherError> {
        Self::new(config.region(), config.cluster_id(), collaborators).await
    }

    /// Ties the publisher's lifetime to the given cancellation token.
    ///
    /// When `parent` is cancelled, the publisher stops as if [`stop`][Self::stop] had been called. This only takes effect
    /// before the publisher is started: once started, or stopped, the call is ignored.
    pub fn with_parent_cancellation(mut self, parent: &CancellationToken) -> Self {
        let created = matches!(*self.lock_state(), LifecycleState::Created);
        if created {
            self.shutdown = parent.child_token();
        } else {
            warn!("Publisher already started or stopped. Ignoring parent cancellation token.");
        }
        self
    }

    /// Returns the region metrics are published to.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns the cluster identifier attached to every data point.
    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Returns the number of data points waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if the flush loop is running.
    pub fn is_running(&self) -> bool {
        matches!(*self.lock_state(), LifecycleState::Running(_)) && !self.shutdown.is_cancelled()
    }

    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the flush loop, publishing every `publish_interval_secs` seconds.
    ///
    /// The first flush happens one full interval after starting. The publisher can only be started once: calling this
    /// again while running, or after the publisher has been stopped, does nothing. An interval of zero is raised to one
    /// second.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, publish_interval_secs: u64) {
        let mut state = self.lock_state();
        match *state {
            LifecycleState::Created => {}
            LifecycleState::Running(_) => {
                warn!("Publisher already started. Ignoring.");
                return;
            }
            LifecycleState::Stopped => {
                warn!("Publisher has been stopped and cannot be restarted. Ignoring.");
                return;
            }
        }

        let publish_interval_secs = if publish_interval_secs == 0 {
            warn!("Publish interval must be at least one second. Using one second.");
            1
        } else {
            publish_interval_secs
        };

        info!(publish_interval_secs, "Starting monitor loop for metrics publisher.");

        let flush_loop = run_flush_loop(
            Arc::clone(&self.queue),
            self.chunked.clone(),
            self.telemetry.clone(),
            Duration::from_secs(publish_interval_secs),
            self.shutdown.clone(),
        );
        let handle = tokio::spawn(flush_loop.in_current_span());

        *state = LifecycleState::Running(handle);
    }

    /// Publishes the given data points.
    ///
    /// The data points are tagged with the routing dimensions, replacing any dimensions they already have, and queued
    /// until the next flush. Once the publisher has been stopped, data points are discarded.
    pub fn publish<I>(&self, points: I)
    where
        I: IntoIterator<Item = MetricDatapoint>,
    {
        if self.shutdown.is_cancelled() {
            let dropped = points.into_iter().count() as u64;
            debug!(dropped, "Publisher stopped. Discarding data points.");
            self.telemetry.points_dropped_shutdown().increment(dropped);
            return;
        }

        trace!("Tagging data points with routing dimensions.");
        let tagged = self.tagger.tag_all(points).collect::<Vec<_>>();
        let count = tagged.len() as u64;

        self.queue.enqueue(tagged);
        self.telemetry.points_enqueued().increment(count);
    }

    /// Stops the flush loop.
    ///
    /// Data points queued since the last flush are discarded. This does not wait for a flush that is already in
    /// progress to complete.
    pub fn stop(&self) {
        let mut state = self.lock_state();
        info!("Stopping monitor loop for metrics publisher.");

        self.shutdown.cancel();
        *state = LifecycleState::Stopped;
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.shutdown.cancel();

        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let LifecycleState::Running(handle) = state {
            handle.abort();
        }
    }
}

async fn run_flush_loop(
    queue: Arc<MetricBatchQueue>, chunked: ChunkedPublisher, telemetry: PublisherTelemetry, publish_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + publish_interval, publish_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        select! {
            biased;

            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let batch = queue.drain_and_swap();
                debug!(batch_len = batch.len(), "Flushing pending data points.");
                chunked.publish_batch(batch).await;
            }
        }
    }

    let discarded = queue.drain_and_swap().len();
    if discarded > 0 {
        debug!(discarded, "Discarding data points queued since the last flush.");
        telemetry.points_dropped_shutdown().increment(discarded as u64);
    }

    debug!("Monitor loop for metrics publisher stopped.");
}
