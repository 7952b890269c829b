use std::time::SystemTime;

use crate::types::{Metric, MetricKey, MetricType, MetricValue, Point};

/// Values collected into a distribution. Each value is reported as its own point;
/// aggregation into percentiles happens downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    /// Metric name
    pub name: String,
    /// Tags, order preserved
    pub tags: Vec<String>,
    /// Observations in the order they were recorded
    pub values: Vec<MetricValue>,
}

impl Distribution {
    /// A distribution with explicit observations
    pub fn new(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
        values: impl IntoIterator<Item = MetricValue>,
    ) -> Self {
        Self {
            name: name.into(),
            tags: tags.into_iter().map(Into::into).collect(),
            values: values.into_iter().collect(),
        }
    }

    /// A distribution holding one value observed now
    pub fn observe(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
        value: impl Into<f64>,
    ) -> Self {
        Self::new(name, tags, [MetricValue::new(SystemTime::now(), value)])
    }

    /// Record another observation
    pub fn push(&mut self, timestamp: SystemTime, value: impl Into<f64>) {
        self.values.push(MetricValue::new(timestamp, value))
    }
}

impl Metric for Distribution {
    fn key(&self) -> MetricKey {
        MetricKey {
            name: self.name.clone(),
            tags: self.tags.clone(),
        }
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Distribution
    }

    fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.values.iter().copied().map(Point::from)
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, UNIX_EPOCH};

    use crate::types::{Metric, MetricKey, MetricType, MetricValue};

    use super::Distribution;

    #[test_log::test]
    fn points_keep_value_order() {
        let later = UNIX_EPOCH + Duration::from_secs(20);
        let earlier = UNIX_EPOCH + Duration::from_secs(10);
        let mut distribution = Distribution::new(
            "latency",
            ["service:api"],
            [MetricValue::new(later, 3), MetricValue::new(earlier, 1)],
        );
        distribution.push(later, 2.5);

        assert_eq!(
            vec![[20.0, 3.0], [10.0, 1.0], [20.0, 2.5]],
            distribution
                .points()
                .map(|point| point.as_pair())
                .collect::<Vec<_>>()
        );
        assert_eq!(MetricKey::new("latency", ["service:api"]), distribution.key());
        assert_eq!(MetricType::Distribution, distribution.metric_type());
    }
}
