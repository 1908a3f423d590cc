use tracing::{debug, info, warn};

use crate::{datapoint::MetricDatapoint, providers::SharedMetricsTransport, telemetry::PublisherTelemetry};

/// Namespace all metrics are published under.
pub const METRIC_NAMESPACE: &str = "Kubernetes";

/// Maximum number of data points the backend accepts in a single request.
pub const MAX_DATA_POINTS: usize = 20;

/// Publishes batches of data points in backend-sized chunks.
///
/// Chunks are submitted one after another, never concurrently. A chunk that fails to submit is logged and dropped, and
/// the remaining chunks are still attempted: there is no retry, and nothing is put back on the queue.
#[derive(Clone)]
pub struct ChunkedPublisher {
    transport: SharedMetricsTransport,
    namespace: &'static str,
    max_data_points: usize,
    telemetry: PublisherTelemetry,
}

impl ChunkedPublisher {
    /// Creates a new `ChunkedPublisher` over the given transport.
    pub fn new(transport: SharedMetricsTransport, telemetry: PublisherTelemetry) -> Self {
        Self {
            transport,
            namespace: METRIC_NAMESPACE,
            max_data_points: MAX_DATA_POINTS,
            telemetry,
        }
    }

    /// Sets the maximum number of data points per chunk.
    ///
    /// Values of zero are treated as one.
    pub fn with_max_data_points(mut self, max_data_points: usize) -> Self {
        self.max_data_points = max_data_points.max(1);
        self
    }

    /// Publishes the given batch.
    pub async fn publish_batch(&self, points: Vec<MetricDatapoint>) {
        if points.is_empty() {
            info!("Missing data for publishing metrics.");
            return;
        }

        let batch_len = points.len();
        let mut remaining = points.into_iter().peekable();
        let mut chunk_index = 0;

        while remaining.peek().is_some() {
            let chunk = remaining.by_ref().take(self.max_data_points).collect::<Vec<_>>();
            let chunk_len = chunk.len();
            chunk_index += 1;

            debug!(chunk_index, chunk_len, "Sending data to metrics backend.");
            match self.transport.submit_batch(self.namespace, chunk).await {
                Ok(()) => {
                    self.telemetry.chunks_submitted().increment(1);
                }
                Err(e) => {
                    warn!(error = %e, chunk_index, chunk_len, "Unable to publish metrics.");
                    self.telemetry.chunks_failed().increment(1);
                    self.telemetry.points_dropped_submission().increment(chunk_len as u64);
                }
            }
        }

        self.telemetry.batches_flushed().increment(1);
        debug!(batch_len, chunks = chunk_index, "Finished publishing batch.");
    }
}
