//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the consumer loop of the orders queue. It owns one delivery source,
// hands every delivery to the order message handler and settles it with the broker.
//
// | Component           | Description                                                 |
// |---------------------|-------------------------------------------------------------|
// | OrderWorker         | Long-lived consumer, one delivery in flight at a time       |
// | WorkerState         | Observable lifecycle of the worker                          |
// | DeliveryOutcome     | How a single delivery was settled                           |
//
//--------------------------------------------------------------------------------------------------
// SETTLEMENT
//--------------------------------------------------------------------------------------------------
// | Processing result              | Action                                                  |
// |--------------------------------|---------------------------------------------------------|
// | persisted / already persisted  | ack                                                     |
// | failed, below attempt limit    | nack + requeue                                          |
// | failed, attempt limit reached  | publish to dead-letter queue, then ack                  |
// | dead-letter publish failed     | nack + requeue                                          |
// | cancelled while processing     | left unacked, redelivered once the source is closed     |
//--------------------------------------------------------------------------------------------------

use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{
    models::{CodecError, OrderCreatedMessage},
    ports::{Delivery, DeliverySource, MessagePublisher, QueueError},
    services::order_message_handler::{HandleOutcome, OrderMessageError, OrderMessageHandler},
};

/// Lifecycle of an [`OrderWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Connecting,
    Consuming,
}

/// How a delivery was settled with the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acked,
    Requeued,
    DeadLettered,
}

/// Errors that stop the worker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Worker is already running")]
    AlreadyRunning,

    #[error("Failed to connect to the orders queue: {0}")]
    Connect(QueueError),

    #[error("Failed to release the orders queue: {0}")]
    Close(QueueError),
}

/// Why a delivery could not be processed.
#[derive(Debug, Error)]
enum ProcessingError {
    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error(transparent)]
    Handle(#[from] OrderMessageError),
}

struct DeadLetterPolicy {
    publisher: Arc<dyn MessagePublisher>,
    max_attempts: u32,
}

/// Messages whose failures are tracked at once.
pub const DEFAULT_MAX_TRACKED_MESSAGES: usize = 10_000;

/// How long a failure counts towards dead-lettering.
pub const DEFAULT_ATTEMPT_TTL: Duration = Duration::from_secs(60 * 60);

struct Attempts {
    count: u32,
    last_failure: Instant,
    /// Order of the last failure among all tracked messages
    sequence: u64,
}

/// Failure counts per message.
///
/// Entries expire `ttl` after their last failure, so a message that later succeeded on
/// another worker does not stay here. Past `max_tracked` entries the least recently
/// failed one is dropped.
struct AttemptTracker {
    entries: HashMap<String, Attempts>,
    next_sequence: u64,
    max_tracked: usize,
    ttl: Duration,
}

impl AttemptTracker {
    fn new(max_tracked: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            next_sequence: 0,
            max_tracked,
            ttl,
        }
    }

    /// Records a failure of `key` and returns its failure count.
    fn record_failure(&mut self, key: &str) -> u32 {
        let now = Instant::now();
        let ttl = self.ttl;
        self.entries
            .retain(|_, attempts| now.duration_since(attempts.last_failure) < ttl);

        if !self.entries.contains_key(key) && self.entries.len() >= self.max_tracked {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, attempts)| attempts.sequence)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let attempts = self.entries.entry(key.to_owned()).or_insert(Attempts {
            count: 0,
            last_failure: now,
            sequence,
        });
        attempts.count += 1;
        attempts.last_failure = now;
        attempts.sequence = sequence;
        attempts.count
    }

    fn forget(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Consumer of the orders queue.
///
/// Processes one delivery at a time and acknowledges it only after the order was
/// persisted. Failed deliveries are requeued; with a dead-letter policy they are moved
/// to the dead-letter queue once they failed `max_attempts` times.
///
/// Failure counts are kept in memory per message id, so they restart from zero when
/// the worker process restarts. They are bounded in number and age, see
/// [`OrderWorker::with_attempt_tracking`].
pub struct OrderWorker {
    handler: Arc<dyn OrderMessageHandler>,
    dead_letter: Option<DeadLetterPolicy>,
    attempts: Mutex<AttemptTracker>,
    state: RwLock<WorkerState>,
}

/// Resets the worker state when `run` returns, whichever path it takes.
struct StoppedOnDrop<'a>(&'a RwLock<WorkerState>);

impl Drop for StoppedOnDrop<'_> {
    fn drop(&mut self) {
        *self.0.write() = WorkerState::Stopped;
    }
}

impl OrderWorker {
    /// Creates a worker that requeues failed deliveries without limit.
    pub fn new(handler: Arc<dyn OrderMessageHandler>) -> Self {
        Self {
            handler,
            dead_letter: None,
            attempts: Mutex::new(AttemptTracker::new(
                DEFAULT_MAX_TRACKED_MESSAGES,
                DEFAULT_ATTEMPT_TTL,
            )),
            state: RwLock::new(WorkerState::Stopped),
        }
    }

    /// Moves deliveries that failed `max_attempts` times to the dead-letter queue.
    ///
    /// # Arguments
    /// * `publisher` - Publisher to the dead-letter queue
    /// * `max_attempts` - Failures tolerated per message; `0` keeps requeueing forever
    pub fn with_dead_letter(mut self, publisher: Arc<dyn MessagePublisher>, max_attempts: u32) -> Self {
        self.dead_letter = Some(DeadLetterPolicy {
            publisher,
            max_attempts,
        });
        self
    }

    /// Bounds the failure counts kept for dead-lettering.
    ///
    /// # Arguments
    /// * `max_tracked` - Messages tracked at once; the least recently failed is dropped first
    /// * `ttl` - Time after its last failure when a message's count is forgotten
    pub fn with_attempt_tracking(self, max_tracked: usize, ttl: Duration) -> Self {
        *self.attempts.lock() = AttemptTracker::new(max_tracked, ttl);
        self
    }

    /// Number of messages with a failure count.
    pub fn tracked_messages(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    /// Connects and consumes until `cancel` fires or the delivery stream ends.
    ///
    /// The source produced by `connect` is owned by this call and closed before it
    /// returns. A delivery being processed when `cancel` fires is left unacknowledged.
    ///
    /// # Errors
    /// Returns an error if the worker is already running, the connection fails or the
    /// source cannot be closed
    pub async fn run<S, F>(&self, connect: F, cancel: CancellationToken) -> Result<(), WorkerError>
    where
        S: DeliverySource,
        F: Future<Output = Result<S, QueueError>> + Send,
    {
        {
            let mut state = self.state.write();
            if *state != WorkerState::Stopped {
                return Err(WorkerError::AlreadyRunning);
            }
            *state = WorkerState::Connecting;
        }
        let _stopped = StoppedOnDrop(&self.state);

        info!("Worker connecting to the orders queue");
        let connected = select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Worker cancelled while connecting");
                return Ok(());
            }
            connected = connect => connected,
        };

        let mut source = connected.map_err(|err| {
            error!("Worker failed to connect: {}", err);
            WorkerError::Connect(err)
        })?;

        *self.state.write() = WorkerState::Consuming;
        info!("Worker consuming");

        self.consume(&mut source, &cancel).await;

        source.close().await.map_err(|err| {
            error!("Worker failed to release the orders queue: {}", err);
            WorkerError::Close(err)
        })?;

        info!("Worker stopped");
        Ok(())
    }

    async fn consume<S: DeliverySource>(&self, source: &mut S, cancel: &CancellationToken) {
        loop {
            let next = select! {
                biased;
                _ = cancel.cancelled() => return,
                next = source.next_delivery() => next,
            };

            let Some(delivery) = next else {
                warn!("Delivery stream ended");
                return;
            };

            let processed = select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(
                        "Stopping with delivery {} in flight; it stays unacknowledged",
                        delivery.delivery_tag
                    );
                    return;
                }
                processed = self.process(&delivery) => processed,
            };

            if let Err(err) = self.settle(source, &delivery, processed).await {
                error!("Failed to settle delivery {}: {}", delivery.delivery_tag, err);
            }
        }
    }

    /// Processes one delivery and settles it with `source`.
    ///
    /// # Errors
    /// Returns an error if the ack or nack could not be sent
    pub async fn process_delivery<S: DeliverySource>(
        &self,
        source: &mut S,
        delivery: Delivery,
    ) -> Result<DeliveryOutcome, QueueError> {
        let processed = self.process(&delivery).await;
        self.settle(source, &delivery, processed).await
    }

    async fn process(&self, delivery: &Delivery) -> Result<HandleOutcome, ProcessingError> {
        if delivery.redelivered {
            debug!("Delivery {} is a redelivery", delivery.delivery_tag);
        }

        let message = OrderCreatedMessage::decode(&delivery.body)?;
        Ok(self.handler.handle(message).await?)
    }

    async fn settle<S: DeliverySource>(
        &self,
        source: &mut S,
        delivery: &Delivery,
        processed: Result<HandleOutcome, ProcessingError>,
    ) -> Result<DeliveryOutcome, QueueError> {
        let key = attempt_key(delivery);

        let err = match processed {
            Ok(_) => {
                self.attempts.lock().forget(&key);
                source.ack(delivery.delivery_tag).await?;
                return Ok(DeliveryOutcome::Acked);
            }
            Err(err) => err,
        };

        let attempts = self.attempts.lock().record_failure(&key);
        warn!(
            "Failed to process delivery {} (attempt {}): {}",
            delivery.delivery_tag, attempts, err
        );

        if let Some(policy) = &self.dead_letter {
            if policy.max_attempts > 0 && attempts >= policy.max_attempts {
                match policy.publisher.publish(&key, delivery.body.clone()).await {
                    Ok(()) => {
                        self.attempts.lock().forget(&key);
                        source.ack(delivery.delivery_tag).await?;
                        error!(
                            "Dead-lettered delivery {} after {} attempts",
                            delivery.delivery_tag, attempts
                        );
                        return Ok(DeliveryOutcome::DeadLettered);
                    }
                    Err(publish_err) => {
                        error!(
                            "Failed to dead-letter delivery {}: {}",
                            delivery.delivery_tag, publish_err
                        );
                    }
                }
            }
        }

        source.nack(delivery.delivery_tag, true).await?;
        Ok(DeliveryOutcome::Requeued)
    }
}

/// Identifies a message across redeliveries: its id, else a digest of its body.
fn attempt_key(delivery: &Delivery) -> String {
    match &delivery.message_id {
        Some(id) => id.clone(),
        None => {
            let mut hasher = Sha256::new();
            hasher.update(&delivery.body);
            format!("payload:{}", hex::encode(hasher.finalize()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{PublishError, messaging::MockMessagePublisher};
    use async_trait::async_trait;

    /// Records every settlement instead of talking to a queue.
    #[derive(Default)]
    struct RecordingSource {
        acked: Vec<u64>,
        nacked: Vec<(u64, bool)>,
    }

    #[async_trait]
    impl DeliverySource for RecordingSource {
        async fn next_delivery(&mut self) -> Option<Delivery> {
            None
        }

        async fn ack(&mut self, delivery_tag: u64) -> Result<(), QueueError> {
            self.acked.push(delivery_tag);
            Ok(())
        }

        async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), QueueError> {
            self.nacked.push((delivery_tag, requeue));
            Ok(())
        }

        async fn close(self) -> Result<(), QueueError> {
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl OrderMessageHandler for FailingHandler {
        async fn handle(&self, message: OrderCreatedMessage) -> Result<HandleOutcome, OrderMessageError> {
            Err(OrderMessageError::NoItems(message.order_id))
        }
    }

    fn corrupt(tag: u64) -> Delivery {
        Delivery {
            delivery_tag: tag,
            message_id: Some("msg-1".into()),
            redelivered: tag > 1,
            body: b"{ not json".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_nacked_with_requeue_never_acked() {
        let worker = OrderWorker::new(Arc::new(FailingHandler));
        let mut source = RecordingSource::default();

        let outcome = worker.process_delivery(&mut source, corrupt(1)).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::Requeued);
        assert_eq!(source.nacked, vec![(1, true)]);
        assert!(source.acked.is_empty());
    }

    #[tokio::test]
    async fn test_dead_letters_after_max_attempts() {
        let mut dead_letter = MockMessagePublisher::new();
        dead_letter
            .expect_publish()
            .withf(|id, payload| id.to_string() == "msg-1" && payload.as_slice() == b"{ not json")
            .times(1)
            .returning(|_, _| Ok(()));

        let worker = OrderWorker::new(Arc::new(FailingHandler)).with_dead_letter(Arc::new(dead_letter), 3);
        let mut source = RecordingSource::default();

        let mut outcomes = Vec::new();
        for tag in 1..=3 {
            outcomes.push(worker.process_delivery(&mut source, corrupt(tag)).await.unwrap());
        }

        assert_eq!(
            outcomes,
            vec![DeliveryOutcome::Requeued, DeliveryOutcome::Requeued, DeliveryOutcome::DeadLettered]
        );
        assert_eq!(source.nacked, vec![(1, true), (2, true)]);
        assert_eq!(source.acked, vec![3]);
    }

    #[tokio::test]
    async fn test_failed_dead_letter_publish_requeues() {
        let mut dead_letter = MockMessagePublisher::new();
        dead_letter
            .expect_publish()
            .returning(|_, _| Err(PublishError::Broker("unreachable".into())));

        let worker = OrderWorker::new(Arc::new(FailingHandler)).with_dead_letter(Arc::new(dead_letter), 1);
        let mut source = RecordingSource::default();

        let outcome = worker.process_delivery(&mut source, corrupt(1)).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::Requeued);
        assert_eq!(source.nacked, vec![(1, true)]);
        assert!(source.acked.is_empty());
    }

    #[tokio::test]
    async fn test_zero_max_attempts_requeues_forever() {
        let mut dead_letter = MockMessagePublisher::new();
        dead_letter.expect_publish().never();

        let worker = OrderWorker::new(Arc::new(FailingHandler)).with_dead_letter(Arc::new(dead_letter), 0);
        let mut source = RecordingSource::default();

        for tag in 1..=10 {
            let outcome = worker.process_delivery(&mut source, corrupt(tag)).await.unwrap();
            assert_eq!(outcome, DeliveryOutcome::Requeued);
        }
        assert_eq!(source.nacked.len(), 10);
    }

    #[tokio::test]
    async fn test_run_reports_connect_failure_and_stops() {
        let worker = OrderWorker::new(Arc::new(FailingHandler));

        let result = worker
            .run(
                async { Err::<RecordingSource, _>(QueueError::Subscribe("refused".into())) },
                CancellationToken::new(),
            )
            .await;

        assert_eq!(result, Err(WorkerError::Connect(QueueError::Subscribe("refused".into()))));
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_run_returns_when_stream_ends() {
        let worker = OrderWorker::new(Arc::new(FailingHandler));

        let result = worker
            .run(async { Ok(RecordingSource::default()) }, CancellationToken::new())
            .await;

        assert_eq!(result, Ok(()));
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_attempt_key_falls_back_to_payload() {
        let mut delivery = corrupt(1);
        assert_eq!(attempt_key(&delivery), "msg-1");

        delivery.message_id = None;
        let key = attempt_key(&delivery);
        assert!(key.starts_with("payload:"));
        assert_eq!(key.len(), "payload:".len() + 64);
        assert_eq!(key, attempt_key(&delivery));

        delivery.body = b"{ other".to_vec();
        assert_ne!(attempt_key(&delivery), key);
    }

    #[test]
    fn test_attempt_tracker_drops_least_recently_failed() {
        let mut tracker = AttemptTracker::new(2, DEFAULT_ATTEMPT_TTL);

        assert_eq!(tracker.record_failure("a"), 1);
        assert_eq!(tracker.record_failure("b"), 1);
        assert_eq!(tracker.record_failure("a"), 2);
        assert_eq!(tracker.record_failure("c"), 1);

        assert_eq!(tracker.len(), 2);
        // "b" was evicted, so its count starts over
        assert_eq!(tracker.record_failure("b"), 1);
        assert_eq!(tracker.record_failure("c"), 2);
    }

    #[test]
    fn test_attempt_tracker_expires_old_failures() {
        let mut tracker = AttemptTracker::new(DEFAULT_MAX_TRACKED_MESSAGES, Duration::ZERO);

        assert_eq!(tracker.record_failure("a"), 1);
        assert_eq!(tracker.record_failure("b"), 1);
        assert_eq!(tracker.record_failure("a"), 1);
        assert_eq!(tracker.len(), 1);

        tracker.forget("a");
        assert_eq!(tracker.len(), 0);
    }

    #[tokio::test]
    async fn test_worker_tracks_bounded_number_of_messages() {
        let worker = OrderWorker::new(Arc::new(FailingHandler))
            .with_attempt_tracking(2, DEFAULT_ATTEMPT_TTL);
        let mut source = RecordingSource::default();

        for (tag, id) in [(1, "m-1"), (2, "m-2"), (3, "m-3")] {
            let mut delivery = corrupt(tag);
            delivery.message_id = Some(id.into());
            worker.process_delivery(&mut source, delivery).await.unwrap();
        }

        assert_eq!(worker.tracked_messages(), 2);
        assert_eq!(source.nacked.len(), 3);
    }
}
