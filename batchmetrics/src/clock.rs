//! Where the processor gets its time and its flush cadence.

use std::time::{Duration, SystemTime};

use futures::{stream::BoxStream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

/// A provider of wall-clock time and periodic ticks.
///
/// Primarily for testing: a manual clock lets you decide exactly when a flush happens.
pub trait Clock: Send + Sync + 'static {
    /// Current wall-clock time
    fn now(&self) -> SystemTime;

    /// A stream that yields once per `period`, forever.
    /// The processor flushes every time this yields.
    fn new_ticker(&self, period: Duration) -> BoxStream<'static, SystemTime>;
}

/// The real clock, ticking on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn new_ticker(&self, period: Duration) -> BoxStream<'static, SystemTime> {
        // tokio's interval completes its first tick immediately; a flush at startup is useless
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        IntervalStream::new(interval)
            .map(|_| SystemTime::now())
            .boxed()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use futures::StreamExt;

    use super::{Clock, SystemClock};

    #[test_log::test(tokio::test(start_paused = true))]
    async fn system_ticker_waits_one_period() {
        let start = tokio::time::Instant::now();
        let mut ticker = SystemClock.new_ticker(Duration::from_secs(10));

        ticker.next().await.expect("tickers never end");
        assert_eq!(Duration::from_secs(10), start.elapsed());
        ticker.next().await.expect("tickers never end");
        assert_eq!(Duration::from_secs(20), start.elapsed());
    }
}
