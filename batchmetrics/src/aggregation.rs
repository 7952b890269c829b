//! The live, lock-protected batch that metrics are folded into between flushes.

#[cfg(not(feature = "ahash-hasher"))]
use std::collections::hash_map::RandomState;
use std::{collections::HashMap, mem::take, sync::Mutex};

#[cfg(feature = "ahash-hasher")]
use ahash::RandomState;

use crate::types::{ApiMetric, Metric, MetricKey};

/// Alias for the default hasher, selected by the ahash-hasher crate feature
pub(crate) type Hasher = RandomState;

/// Records in first-seen order, with an index from grouping identity to position.
#[derive(Debug, Default)]
struct BatchState {
    positions: HashMap<MetricKey, usize, Hasher>,
    metrics: Vec<ApiMetric>,
}

/// Grouping identity -> accumulating [`ApiMetric`], for one flush window.
///
/// `add` and `swap` are mutually exclusive. Nothing slow happens under the lock:
/// sending is done by whoever took the contents with `swap`.
#[derive(Debug, Default)]
pub struct AggregateBatch {
    state: Mutex<BatchState>,
}

impl AggregateBatch {
    /// Fold a metric's points into the record for its grouping identity.
    pub fn add(&self, metric: impl Metric) {
        let key = metric.key();
        let mut state = self
            .state
            .lock()
            .expect("local mutex should not be poisoned");
        let state = &mut *state;
        let position = match state.positions.get(&key) {
            Some(position) => *position,
            None => {
                let position = state.metrics.len();
                state
                    .metrics
                    .push(ApiMetric::new(key.clone(), metric.metric_type()));
                state.positions.insert(key, position);
                position
            }
        };
        state.metrics[position].points.extend(metric.points());
    }

    /// Take everything added since the last swap, leaving an empty batch behind.
    /// Records come back in the order their grouping identity was first added.
    pub fn swap(&self) -> Vec<ApiMetric> {
        let drained = take(
            &mut *self
                .state
                .lock()
                .expect("local mutex should not be poisoned"),
        );
        drained.metrics
    }

    /// True when nothing has been added since the last swap
    pub fn is_empty(&self) -> bool {
        self.state
            .lock()
            .expect("local mutex should not be poisoned")
            .metrics
            .is_empty()
    }
}
