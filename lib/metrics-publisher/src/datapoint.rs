//! Metric data points and dimensions.

use std::{fmt, time::SystemTime};

/// A metric dimension.
///
/// Dimensions are name/value pairs that the backend uses to route and filter data points. They are immutable once
/// constructed.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Dimension {
    name: String,
    value: String,
}

impl Dimension {
    /// Creates a new `Dimension` with the given name and value.
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the name of the dimension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value of the dimension.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Unit of a metric data point.
///
/// Mirrors the standard unit vocabulary of the metrics backend.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Unit {
    Seconds,
    Microseconds,
    Milliseconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
    Bits,
    Kilobits,
    Megabits,
    Gigabits,
    Terabits,
    Percent,
    Count,
    BytesPerSecond,
    KilobytesPerSecond,
    MegabytesPerSecond,
    GigabytesPerSecond,
    TerabytesPerSecond,
    BitsPerSecond,
    KilobitsPerSecond,
    MegabitsPerSecond,
    GigabitsPerSecond,
    TerabitsPerSecond,
    CountPerSecond,
    #[default]
    None,
}

impl Unit {
    /// Returns the wire representation of this unit.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Seconds => "Seconds",
            Self::Microseconds => "Microseconds",
            Self::Milliseconds => "Milliseconds",
            Self::Bytes => "Bytes",
            Self::Kilobytes => "Kilobytes",
            Self::Megabytes => "Megabytes",
            Self::Gigabytes => "Gigabytes",
            Self::Terabytes => "Terabytes",
            Self::Bits => "Bits",
            Self::Kilobits => "Kilobits",
            Self::Megabits => "Megabits",
            Self::Gigabits => "Gigabits",
            Self::Terabits => "Terabits",
            Self::Percent => "Percent",
            Self::Count => "Count",
            Self::BytesPerSecond => "Bytes/Second",
            Self::KilobytesPerSecond => "Kilobytes/Second",
            Self::MegabytesPerSecond => "Megabytes/Second",
            Self::GigabytesPerSecond => "Gigabytes/Second",
            Self::TerabytesPerSecond => "Terabytes/Second",
            Self::BitsPerSecond => "Bits/Second",
            Self::KilobitsPerSecond => "Kilobits/Second",
            Self::MegabitsPerSecond => "Megabits/Second",
            Self::GigabitsPerSecond => "Gigabits/Second",
            Self::TerabitsPerSecond => "Terabits/Second",
            Self::CountPerSecond => "Count/Second",
            Self::None => "None",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single metric data point.
///
/// Producers create data points and hand them to the publisher, which overwrites their dimensions before queueing
/// them. Once drained and submitted, the data point is dropped: nothing holds on to it after the submission returns.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricDatapoint {
    name: String,
    value: f64,
    unit: Unit,
    timestamp: Option<SystemTime>,
    dimensions: Vec<Dimension>,
}

impl MetricDatapoint {
    /// Creates a new `MetricDatapoint` with the given name and value.
    ///
    /// The unit defaults to [`Unit::None`], and no timestamp is set, which lets the backend stamp the data point with
    /// its time of receipt.
    pub fn new<N>(name: N, value: f64) -> Self
    where
        N: Into<String>,
    {
        Self {
            name: name.into(),
            value,
            unit: Unit::None,
            timestamp: None,
            dimensions: Vec::new(),
        }
    }

    /// Sets the unit of the data point.
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// Sets the timestamp of the data point.
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Adds a dimension to the data point.
    ///
    /// Dimensions set by producers are replaced by the publisher's routing dimensions when the data point is published.
    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Replaces the dimensions of the data point.
    pub fn set_dimensions(&mut self, dimensions: Vec<Dimension>) {
        self.dimensions = dimensions;
    }
}
