//! Where undeliverable batches are reported

use std::fmt::Display;

use crate::downstream::TransportError;

/// A drain that accepts Sunk
pub trait Sink<Sunk> {
    /// Take ownership of a value
    fn accept(&self, to_sink: Sunk);
}

/// A chunk that could not be delivered. The records are gone; this is the report.
#[derive(Debug)]
pub struct SendFailure {
    /// How many times the chunk was handed to the transport
    pub attempts: usize,
    /// How many records were in the chunk
    pub records: usize,
    /// The last error the transport returned
    pub error: TransportError,
}

impl Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dropped {} metrics after {} attempts: {}",
            self.records, self.attempts, self.error
        )
    }
}

impl std::error::Error for SendFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

/// A sink that just logs what it is given and drops it
pub struct LoggingSink {
    log_level: log::Level,
}

impl LoggingSink {
    /// Log at a level other than error
    pub fn new(log_level: log::Level) -> Self {
        Self { log_level }
    }
}

impl Default for LoggingSink {
    fn default() -> Self {
        Self {
            log_level: log::Level::Error,
        }
    }
}

impl<T> Sink<T> for LoggingSink
where
    T: Display,
{
    fn accept(&self, to_sink: T) {
        log::log!(self.log_level, "failed to send metrics: {to_sink}")
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::{LoggingSink, SendFailure, Sink};

    #[test_log::test]
    fn failure_describes_what_was_lost() {
        let failure = SendFailure {
            attempts: 3,
            records: 12,
            error: "connection refused".into(),
        };
        assert_eq!(
            "dropped 12 metrics after 3 attempts: connection refused",
            failure.to_string()
        );
        assert_eq!(
            "connection refused",
            failure.source().expect("keeps the cause").to_string()
        );

        LoggingSink::default().accept(failure);
    }
}
