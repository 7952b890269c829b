use std::{
    mem::replace,
    ops::ControlFlow,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::StreamExt;
use tokio::{select, sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    aggregation::AggregateBatch,
    clock::Clock,
    downstream::Transport,
    pipeline::{LoggingSink, SendFailure, Sink},
    types::{ApiMetric, Metric},
};

/// Tuning for a [`Processor`].
#[derive(Debug, Clone)]
pub struct ProcessorConfiguration {
    flush_interval: Duration,
    max_batch_size: usize,
    should_retry: bool,
    max_attempts: usize,
    retry_backoff: Duration,
}

impl Default for ProcessorConfiguration {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(10),
            max_batch_size: 1000,
            should_retry: true,
            max_attempts: 3,
            retry_backoff: Duration::ZERO,
        }
    }
}

impl ProcessorConfiguration {
    /// Set how often the background loop flushes (default 10s)
    pub fn flush_interval(&mut self, flush_interval: Duration) -> &mut Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Set the most records handed to the transport in one send (default 1000, at least 1)
    pub fn max_batch_size(&mut self, max_batch_size: usize) -> &mut Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Set whether a failed send is attempted again (default true)
    pub fn should_retry(&mut self, should_retry: bool) -> &mut Self {
        self.should_retry = should_retry;
        self
    }

    /// Set the total attempts per chunk when retrying (default 3, at least 1)
    pub fn max_attempts(&mut self, max_attempts: usize) -> &mut Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the pause between attempts of the same chunk (default none)
    pub fn retry_backoff(&mut self, retry_backoff: Duration) -> &mut Self {
        self.retry_backoff = retry_backoff;
        self
    }

    fn attempts_per_chunk(&self) -> usize {
        if self.should_retry {
            self.max_attempts
        } else {
            1
        }
    }
}

/// Collects metrics from any number of callers and sends them in batches from a
/// background task.
///
/// ```text
///  add_metric ──> AggregateBatch ──swap on tick / finish──> chunks ──> Transport
/// ```
///
/// Sending never happens on the caller's task and never holds the batch lock, so a slow
/// transport cannot slow down `add_metric`. Cancelling the token stops the background
/// task without sending what it holds.
///
/// Dropping a started processor without calling `finish_processing` still gets a final
/// flush: the background task treats the dropped handle like a stop request.
pub struct Processor<TTransport, TClock> {
    batch: Arc<AggregateBatch>,
    control: Mutex<Control<TTransport, TClock>>,
}

enum Control<TTransport, TClock> {
    Idle(FlushLoop<TTransport, TClock>),
    Running {
        stop: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

impl<TTransport, TClock> Processor<TTransport, TClock>
where
    TTransport: Transport,
    TClock: Clock,
{
    /// A processor that is not flushing yet. Failures are logged.
    ///
    /// `max_batch_size` is the most records per send; `should_retry` allows up to 3
    /// attempts per chunk.
    pub fn new(
        cancellation: CancellationToken,
        transport: TTransport,
        clock: TClock,
        max_batch_size: usize,
        should_retry: bool,
    ) -> Self {
        let mut configuration = ProcessorConfiguration::default();
        configuration
            .max_batch_size(max_batch_size)
            .should_retry(should_retry);
        Self::with_configuration(
            cancellation,
            transport,
            clock,
            configuration,
            LoggingSink::default(),
        )
    }

    /// A processor that is not flushing yet, reporting undeliverable chunks to `failure_sink`.
    pub fn with_configuration(
        cancellation: CancellationToken,
        transport: TTransport,
        clock: TClock,
        configuration: ProcessorConfiguration,
        failure_sink: impl Sink<SendFailure> + Send + Sync + 'static,
    ) -> Self {
        let batch = Arc::new(AggregateBatch::default());
        Self {
            batch: batch.clone(),
            control: Mutex::new(Control::Idle(FlushLoop {
                batch,
                transport,
                clock,
                configuration,
                failure_sink: Box::new(failure_sink),
                cancellation,
            })),
        }
    }

    /// Queue a metric for the next flush. This never waits on the network.
    #[inline]
    pub fn add_metric(&self, metric: impl Metric) {
        self.batch.add(metric)
    }

    /// Spawn the background flush loop on the current tokio runtime.
    ///
    /// Only the first call does anything.
    pub fn start_processing(&self) {
        let mut control = self
            .control
            .lock()
            .expect("local mutex should not be poisoned");
        match replace(&mut *control, Control::Stopped) {
            Control::Idle(flush_loop) => {
                let (stop, stopped) = oneshot::channel();
                let handle = tokio::spawn(flush_loop.run(stopped));
                *control = Control::Running { stop, handle };
            }
            already_started => {
                log::error!("start_processing called more than once; ignoring");
                *control = already_started;
            }
        }
    }

    /// Flush whatever is pending one last time, then stop the background loop.
    ///
    /// Resolves once the final flush has been sent, has failed, or was skipped because
    /// the processor was cancelled. Works whether or not processing was started.
    pub async fn finish_processing(&self) {
        let previous = replace(
            &mut *self
                .control
                .lock()
                .expect("local mutex should not be poisoned"),
            Control::Stopped,
        );
        match previous {
            Control::Idle(flush_loop) => {
                let (stop, stopped) = oneshot::channel();
                // The receiver is right here
                let _ = stop.send(());
                flush_loop.run(stopped).await;
            }
            Control::Running { stop, handle } => {
                if stop.send(()).is_err() {
                    log::debug!("flush loop already exited");
                }
                if let Err(e) = handle.await {
                    log::error!("flush loop did not exit cleanly: {e:?}");
                }
            }
            Control::Stopped => {
                log::debug!("finish_processing called after processing finished");
            }
        }
    }
}

/// Everything the background task owns.
struct FlushLoop<TTransport, TClock> {
    batch: Arc<AggregateBatch>,
    transport: TTransport,
    clock: TClock,
    configuration: ProcessorConfiguration,
    failure_sink: Box<dyn Sink<SendFailure> + Send + Sync>,
    cancellation: CancellationToken,
}

impl<TTransport, TClock> FlushLoop<TTransport, TClock>
where
    TTransport: Transport,
    TClock: Clock,
{
    async fn run(self, mut stopped: oneshot::Receiver<()>) {
        let mut ticker = self
            .clock
            .new_ticker(self.configuration.flush_interval)
            .fuse();
        log::info!("started metrics processing");
        loop {
            select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    log::info!("metrics processing cancelled; dropping unsent metrics");
                    break;
                }
                stop = &mut stopped => {
                    if stop.is_err() {
                        log::debug!("processor dropped without finishing; flushing");
                    }
                    self.flush().await;
                    log::info!("finished metrics processing");
                    break;
                }
                Some(tick) = ticker.next() => {
                    log::trace!("tick at {tick:?}");
                    self.flush().await;
                }
            }
        }
    }

    async fn flush(&self) {
        let metrics = self.batch.swap();
        if self.cancellation.is_cancelled() {
            if !metrics.is_empty() {
                log::debug!("dropping {} metrics: cancelled", metrics.len());
            }
            return;
        }
        if metrics.is_empty() {
            log::trace!("nothing to flush");
            return;
        }
        log::debug!(
            "flushing {} metrics at {:?}",
            metrics.len(),
            self.clock.now()
        );
        self.drain(metrics).await
    }

    async fn drain(&self, metrics: Vec<ApiMetric>) {
        let mut chunks = metrics.chunks(self.configuration.max_batch_size);
        for chunk in chunks.by_ref() {
            if self.send_chunk(chunk).await.is_break() {
                break;
            }
        }
        let abandoned: usize = chunks.map(<[ApiMetric]>::len).sum();
        if 0 < abandoned {
            log::debug!("dropping {abandoned} unsent metrics: cancelled");
        }
    }

    /// Breaks when cancellation cut the send short.
    async fn send_chunk(&self, chunk: &[ApiMetric]) -> ControlFlow<()> {
        let max_attempts = self.configuration.attempts_per_chunk();
        let mut attempt = 0;
        loop {
            if self.cancellation.is_cancelled() {
                log::debug!("dropping {} metrics: cancelled", chunk.len());
                return ControlFlow::Break(());
            }
            attempt += 1;
            match self.transport.send_batch(chunk).await {
                Ok(()) => {
                    log::debug!("sent {} metrics", chunk.len());
                    return ControlFlow::Continue(());
                }
                Err(error) if attempt < max_attempts => {
                    log::warn!(
                        "failed to send metrics (attempt {attempt} of {max_attempts}): {error}"
                    );
                }
                Err(error) => {
                    self.failure_sink.accept(SendFailure {
                        attempts: attempt,
                        records: chunk.len(),
                        error,
                    });
                    return ControlFlow::Continue(());
                }
            }
            if !self.configuration.retry_backoff.is_zero() {
                select! {
                    biased;
                    _ = self.cancellation.cancelled() => {}
                    _ = tokio::time::sleep(self.configuration.retry_backoff) => {}
                }
            }
        }
    }
}
