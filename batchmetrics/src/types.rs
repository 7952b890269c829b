use std::{
    fmt::Display,
    time::{SystemTime, UNIX_EPOCH},
};

/// A single observation: when it happened and what was observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricValue {
    /// Wall-clock time of the observation
    pub timestamp: SystemTime,
    /// The observed value
    pub value: f64,
}

impl MetricValue {
    /// Make a new observation
    #[inline]
    pub fn new(timestamp: SystemTime, value: impl Into<f64>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }
}

impl From<MetricValue> for Point {
    #[inline]
    fn from(value: MetricValue) -> Self {
        Point {
            timestamp: unix_seconds(value.timestamp),
            value: value.value,
        }
    }
}

/// One `[timestamp, value]` pair of an outbound record.
/// The timestamp is whole seconds since the unix epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Seconds since the unix epoch
    pub timestamp: f64,
    /// The observed value
    pub value: f64,
}

impl Point {
    /// The wire shape of a point
    pub fn as_pair(&self) -> [f64; 2] {
        [self.timestamp, self.value]
    }
}

impl From<(f64, f64)> for Point {
    #[inline]
    fn from((timestamp, value): (f64, f64)) -> Self {
        Self { timestamp, value }
    }
}

/// Seconds since the epoch, truncated. Times before the epoch are negative.
pub(crate) fn unix_seconds(timestamp: SystemTime) -> f64 {
    match timestamp.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs() as f64,
        Err(before) => -(before.duration().as_secs() as f64),
    }
}

/// The declared kind of a metric, carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MetricType {
    /// Every observed value is reported as its own point
    Distribution,
}

impl MetricType {
    /// The wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Distribution => "distribution",
        }
    }
}

impl Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The grouping identity of a metric.
///
/// If two metrics have (1) the same name and (2) the same tags in the same order,
/// their points are reported together in one [`ApiMetric`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    /// Metric name
    pub name: String,
    /// Tags, order preserved
    pub tags: Vec<String>,
}

impl MetricKey {
    /// Make a grouping identity
    pub fn new(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

impl Display for MetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:?}", self.name, self.tags)
    }
}

/// Anything that can be folded into an aggregate batch.
///
/// Implement this for new kinds of metrics; the processor only needs these three views.
pub trait Metric {
    /// Name and tags, used to group contributions together
    fn key(&self) -> MetricKey;

    /// Declared kind, copied onto the outbound record
    fn metric_type(&self) -> MetricType;

    /// The points this metric contributes, in the order its values were provided
    fn points(&self) -> impl Iterator<Item = Point> + '_;
}

/// The wire-ready record handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiMetric {
    /// Metric name
    pub name: String,
    /// Tags, order preserved
    pub tags: Vec<String>,
    /// Declared kind
    pub metric_type: MetricType,
    /// Accumulated points in the order they were added
    pub points: Vec<Point>,
}

impl ApiMetric {
    /// An empty record for a grouping identity
    pub fn new(key: MetricKey, metric_type: MetricType) -> Self {
        Self {
            name: key.name,
            tags: key.tags,
            metric_type,
            points: Vec::new(),
        }
    }
}

impl Display for ApiMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entry(&"metric", &self.name)
            .entry(&"tags", &self.tags)
            .entry(&"type", &self.metric_type.as_str())
            .entry(
                &"points",
                &self.points.iter().map(Point::as_pair).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, UNIX_EPOCH};

    use super::{unix_seconds, MetricKey, MetricValue, Point};

    #[test]
    fn unix_seconds_truncates() {
        let timestamp = UNIX_EPOCH + Duration::from_millis(1_136_214_245_999);
        assert_eq!(1_136_214_245.0, unix_seconds(timestamp));
        assert_eq!(-2.0, unix_seconds(UNIX_EPOCH - Duration::from_secs(2)));
    }

    #[test]
    fn metric_value_into_point() {
        let point: Point = MetricValue::new(UNIX_EPOCH + Duration::from_secs(7), 1.5).into();
        assert_eq!([7.0, 1.5], point.as_pair());
    }

    #[test]
    fn tag_order_is_part_of_identity() {
        assert_eq!(
            MetricKey::new("m", ["a", "b"]),
            MetricKey::new("m", vec!["a".to_string(), "b".to_string()])
        );
        assert_ne!(MetricKey::new("m", ["a", "b"]), MetricKey::new("m", ["b", "a"]));
    }
}
