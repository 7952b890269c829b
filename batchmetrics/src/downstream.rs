//! Types related to handing batches to whatever sends them

use std::future::Future;

use tokio::sync::mpsc;

use crate::types::ApiMetric;

/// Whatever went wrong while sending. The processor does not distinguish between errors.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Sends one chunk of wire-ready records to a collector.
///
/// Retry policy belongs to the processor: report any failure, don't retry in here.
pub trait Transport: Send + Sync + 'static {
    /// Send the records. Order matters to the receiver; keep it.
    fn send_batch(
        &self,
        batch: &[ApiMetric],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// A transport that queues batches in an mpsc for a downstream sender task.
///
/// Use this to decouple the processor from the network: spawn a task that drains the
/// receiver and does the real sending.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    queue: mpsc::Sender<Vec<ApiMetric>>,
}

impl ChannelTransport {
    /// Create a new channel transport holding at most `capacity` unsent batches.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<ApiMetric>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        (Self { queue: sender }, receiver)
    }
}

impl Transport for ChannelTransport {
    async fn send_batch(&self, batch: &[ApiMetric]) -> Result<(), TransportError> {
        self.queue.try_send(batch.to_vec())?;
        log::trace!("queued batch of {} records", batch.len());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::types::{ApiMetric, MetricKey, MetricType};

    use super::{ChannelTransport, Transport};

    fn record(name: &str) -> ApiMetric {
        ApiMetric::new(MetricKey::new(name, ["t"]), MetricType::Distribution)
    }

    #[test_log::test(tokio::test)]
    async fn queues_until_full() {
        let (transport, mut receiver) = ChannelTransport::new(1);

        transport
            .send_batch(&[record("a"), record("b")])
            .await
            .expect("there is room for one batch");
        assert!(
            transport.send_batch(&[record("c")]).await.is_err(),
            "a full queue is a failed send"
        );

        let batch = receiver.recv().await.expect("one batch was queued");
        assert_eq!(
            vec!["a", "b"],
            batch.iter().map(|m| m.name.as_str()).collect::<Vec<_>>()
        );
    }

    #[test_log::test(tokio::test)]
    async fn closed_receiver_fails() {
        let (transport, receiver) = ChannelTransport::new(4);
        drop(receiver);

        assert!(transport.send_batch(&[record("a")]).await.is_err());
    }
}
