//! Acknowledgement handle over a single delivery.

use std::time::Duration;

use async_trait::async_trait;
use pulse_nats::stream::{FetchRequest, TypedMessage};

/// One delivery of a [`FetchRequest`] from the work queue.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// The delivered request.
    fn request(&self) -> &FetchRequest;

    /// 1-based delivery attempt.
    fn attempt(&self) -> u64;

    /// Marks the request as done.
    async fn ack(&self) -> pulse_nats::Result<()>;

    /// Asks for redelivery after `delay`.
    async fn nak(&self, delay: Option<Duration>) -> pulse_nats::Result<()>;

    /// Extends the visibility timeout.
    async fn progress(&self) -> pulse_nats::Result<()>;

    /// Gives up on the request; it is not redelivered.
    async fn term(&self) -> pulse_nats::Result<()>;
}

#[async_trait]
impl Delivery for TypedMessage<FetchRequest> {
    fn request(&self) -> &FetchRequest {
        self.payload()
    }

    fn attempt(&self) -> u64 {
        self.delivery_count().unwrap_or(1).max(1)
    }

    async fn ack(&self) -> pulse_nats::Result<()> {
        TypedMessage::ack(self).await
    }

    async fn nak(&self, delay: Option<Duration>) -> pulse_nats::Result<()> {
        TypedMessage::nak(self, delay).await
    }

    async fn progress(&self) -> pulse_nats::Result<()> {
        TypedMessage::progress(self).await
    }

    async fn term(&self) -> pulse_nats::Result<()> {
        TypedMessage::term(self).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Delivery that records every acknowledgement it receives.
    pub struct RecordedDelivery {
        request: FetchRequest,
        attempt: u64,
        acks: Mutex<Vec<&'static str>>,
    }

    impl RecordedDelivery {
        pub fn new(request: FetchRequest, attempt: u64) -> Self {
            Self {
                request,
                attempt,
                acks: Mutex::new(Vec::new()),
            }
        }

        pub fn acks(&self) -> Vec<&'static str> {
            self.acks.lock().expect("acks lock").clone()
        }

        fn record(&self, kind: &'static str) -> pulse_nats::Result<()> {
            self.acks.lock().expect("acks lock").push(kind);
            Ok(())
        }
    }

    #[async_trait]
    impl Delivery for RecordedDelivery {
        fn request(&self) -> &FetchRequest {
            &self.request
        }

        fn attempt(&self) -> u64 {
            self.attempt
        }

        async fn ack(&self) -> pulse_nats::Result<()> {
            self.record("ack")
        }

        async fn nak(&self, _delay: Option<Duration>) -> pulse_nats::Result<()> {
            self.record("nak")
        }

        async fn progress(&self) -> pulse_nats::Result<()> {
            self.record("progress")
        }

        async fn term(&self) -> pulse_nats::Result<()> {
            self.record("term")
        }
    }
}
