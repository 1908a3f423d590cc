use metrics::{counter, Counter};

/// Publisher telemetry.
///
/// Internal counters describing what the publisher did with the data points handed to it. They are registered against
/// whatever `metrics` recorder is installed, and are no-ops if none is.
#[derive(Clone)]
pub struct PublisherTelemetry {
    points_enqueued: Counter,
    batches_flushed: Counter,
    chunks_submitted: Counter,
    chunks_failed: Counter,
    points_dropped_submission: Counter,
    points_dropped_shutdown: Counter,
}

impl PublisherTelemetry {
    /// Creates a new `PublisherTelemetry` instance.
    pub fn new() -> Self {
        Self {
            points_enqueued: counter!("publisher_points_enqueued_total"),
            batches_flushed: counter!("publisher_batches_flushed_total"),
            chunks_submitted: counter!("publisher_chunks_submitted_total"),
            chunks_failed: counter!("publisher_errors_total", "error_type" => "submission"),
            points_dropped_submission: counter!(
                "publisher_points_dropped_total",
                "drop_reason" => "submission_failure"
            ),
            points_dropped_shutdown: counter!("publisher_points_dropped_total", "drop_reason" => "shutdown"),
        }
    }

    pub fn points_enqueued(&self) -> &Counter {
        &self.points_enqueued
    }

    pub fn batches_flushed(&self) -> &Counter {
        &self.batches_flushed
    }

    pub fn chunks_submitted(&self) -> &Counter {
        &self.chunks_submitted
    }

    pub fn chunks_failed(&self) -> &Counter {
        &self.chunks_failed
    }

    pub fn points_dropped_submission(&self) -> &Counter {
        &self.points_dropped_submission
    }

    pub fn points_dropped_shutdown(&self) -> &Counter {
        &self.points_dropped_shutdown
    }
}

impl Default for PublisherTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
