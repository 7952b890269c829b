//! A background batching processor for metrics.
//!
//! [`batchmetrics`] accumulates metric observations from any number of callers,
//! groups them by name and tags, and periodically hands wire-ready batches to a
//! [`Transport`](downstream::Transport). Recording never waits on the network:
//! metrics are never more important than your users. Failed sends are retried a
//! bounded number of times, and a cancelled processor drops what it holds
//! instead of sending it.
//!
//! # Getting Started
//!
//! ```
//! # let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime can be built");
//! # runtime.block_on(async {
//! use batchmetrics::{ChannelTransport, Distribution, Processor, SystemClock};
//! use tokio_util::sync::CancellationToken;
//!
//! let (transport, mut batches) = ChannelTransport::new(16);
//! let processor = Processor::new(CancellationToken::new(), transport, SystemClock, 1000, true);
//! processor.start_processing();
//!
//! processor.add_metric(Distribution::observe("request_latency", ["service:api"], 12.5));
//!
//! processor.finish_processing().await;
//! let batch = batches.recv().await.expect("the final drain sends one batch");
//! assert_eq!("request_latency", batch[0].name);
//! # });
//! ```
//!
//! # Feature Flags
//!
//! * `ahash-hasher`: group metrics with `ahash` instead of the std hasher.

pub mod aggregation;
pub mod clock;
pub mod distribution;
pub mod downstream;
pub mod pipeline;
pub mod processor;
pub mod types;

pub use aggregation::AggregateBatch;
pub use clock::{Clock, SystemClock};
pub use distribution::Distribution;
pub use downstream::{ChannelTransport, Transport, TransportError};
pub use pipeline::{LoggingSink, SendFailure, Sink};
pub use processor::{Processor, ProcessorConfiguration};
pub use types::{ApiMetric, Metric, MetricKey, MetricType, MetricValue, Point};
