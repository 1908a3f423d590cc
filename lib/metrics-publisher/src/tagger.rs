use crate::datapoint::{Dimension, MetricDatapoint};

/// Name of the dimension carrying the cluster identifier.
pub const CLUSTER_ID_DIMENSION: &str = "CLUSTER_ID";

/// Attaches the routing dimensions to outgoing data points.
///
/// The dimension set is fixed at construction: currently a single `CLUSTER_ID` dimension. Tagging replaces whatever
/// dimensions the producer set on the data point.
#[derive(Clone, Debug)]
pub struct DimensionTagger {
    dimensions: Vec<Dimension>,
}

impl DimensionTagger {
    /// Creates a new `DimensionTagger` for the given cluster identifier.
    pub fn new(cluster_id: &str) -> Self {
        Self {
            dimensions: vec![Dimension::new(CLUSTER_ID_DIMENSION, cluster_id)],
        }
    }

    /// Returns the dimensions attached to every data point.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Overwrites the dimensions of the given data point.
    pub fn tag(&self, point: &mut MetricDatapoint) {
        point.set_dimensions(self.dimensions.clone());
    }

    /// Overwrites the dimensions of every data point in the iterator, yielding the tagged points.
    pub fn tag_all<'a, I>(&'a self, points: I) -> impl Iterator<Item = MetricDatapoint> + 'a
    where
        I: IntoIterator<Item = MetricDatapoint>,
        I::IntoIter: 'a,
    {
        points.into_iter().map(move |mut point| {
            self.tag(&mut point);
            point
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_dimensions_are_replaced() {
        let tagger = DimensionTagger::new("prod-cluster");
        let points = vec![
            MetricDatapoint::new("addReqCount", 1.0).with_dimension(Dimension::new("foo", "bar")),
            MetricDatapoint::new("delReqCount", 2.0),
        ];

        let tagged = tagger.tag_all(points).collect::<Vec<_>>();

        for point in &tagged {
            assert_eq!(point.dimensions(), &[Dimension::new("CLUSTER_ID", "prod-cluster")]);
        }
        assert_eq!(tagged[0].name(), "addReqCount");
        assert_eq!(tagged[1].name(), "delReqCount");
    }
}
