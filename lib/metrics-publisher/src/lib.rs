//! Batching metrics publisher.
//!
//! Application code publishes metric data points concurrently, and a single background task flushes them on a fixed
//! interval to the metrics backend. Every data point is tagged with the cluster identifier of the environment the
//! publisher runs in, which is resolved once, from instance tags, when the publisher is constructed.
//!
//! The publisher only talks to the outside world through the traits in [`providers`]: how the region is looked up, how
//! instance tags are read, and how data is actually submitted is up to the caller.

mod chunked;
pub use self::chunked::{ChunkedPublisher, MAX_DATA_POINTS, METRIC_NAMESPACE};

mod cluster;
pub use self::cluster::{ClusterIdentityResolver, CLUSTER_ID_TAGS, DEFAULT_CLUSTER_ID};

pub mod config;

mod datapoint;
pub use self::datapoint::{Dimension, MetricDatapoint, Unit};

mod error;
pub use self::error::{GenericError, PublisherError};

pub mod providers;

mod publisher;
pub use self::publisher::Publisher;

mod queue;
pub use self::queue::{MetricBatchQueue, DEFAULT_QUEUE_CAPACITY};

mod tagger;
pub use self::tagger::{DimensionTagger, CLUSTER_ID_DIMENSION};

mod telemetry;
pub use self::telemetry::PublisherTelemetry;
