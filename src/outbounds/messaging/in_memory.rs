//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                       | Description                                  | Key Methods      |
// |----------------------------|----------------------------------------------|------------------|
// | InMemoryQueue              | Durable-queue stand-in living in process     | publish, consume |
// |                            | memory, cloneable handle                     | shutdown         |
// | InMemoryDeliverySource     | One consumer of an InMemoryQueue             | next_delivery    |
//--------------------------------------------------------------------------------------------------

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::domain::ports::{Delivery, DeliverySource, MessagePublisher, PublishError, QueueError};

#[derive(Debug, Clone)]
struct QueuedMessage {
    message_id: Option<String>,
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueuedMessage>,
    unacked: HashMap<u64, QueuedMessage>,
    next_tag: u64,
    shut_down: bool,
    published: u64,
    acked: u64,
    nacked: u64,
}

/// Work queue kept in process memory, mimicking a broker queue with manual acks.
///
/// Unacknowledged deliveries return to the head of the queue when nacked with requeue
/// or when their consumer closes, flagged as redelivered. After `shutdown`, consumers
/// drain what is ready and then see the end of the stream.
#[derive(Clone)]
pub struct InMemoryQueue {
    name: String,
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl InMemoryQueue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a consumer on this queue.
    pub fn consume(&self) -> InMemoryDeliverySource {
        InMemoryDeliverySource {
            queue: self.clone(),
            outstanding: HashSet::new(),
        }
    }

    /// Ends the stream for consumers once the ready messages are drained.
    pub fn shutdown(&self) {
        self.state.lock().shut_down = true;
        self.notify.notify_waiters();
    }

    /// Messages waiting for a consumer.
    pub fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Messages delivered but neither acked nor nacked.
    pub fn unacked_len(&self) -> usize {
        self.state.lock().unacked.len()
    }

    /// Bodies of the messages waiting for a consumer, head first.
    pub fn ready_bodies(&self) -> Vec<Vec<u8>> {
        self.state.lock().ready.iter().map(|m| m.body.clone()).collect()
    }

    pub fn published_count(&self) -> u64 {
        self.state.lock().published
    }

    pub fn acked_count(&self) -> u64 {
        self.state.lock().acked
    }

    pub fn nacked_count(&self) -> u64 {
        self.state.lock().nacked
    }

    /// Puts a raw message on the queue.
    pub fn push(&self, message_id: Option<String>, body: Vec<u8>) {
        {
            let mut state = self.state.lock();
            state.ready.push_back(QueuedMessage {
                message_id,
                body,
                redelivered: false,
            });
            state.published += 1;
        }
        self.notify.notify_waiters();
    }

    fn take_unacked(&self, tag: u64) -> Result<QueuedMessage, QueueError> {
        self.state.lock().unacked.remove(&tag).ok_or(QueueError::Settle {
            tag,
            reason: "unknown delivery tag".to_string(),
        })
    }

    fn requeue(&self, mut message: QueuedMessage) {
        message.redelivered = true;
        self.state.lock().ready.push_front(message);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl MessagePublisher for InMemoryQueue {
    async fn publish(&self, message_id: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        if self.state.lock().shut_down {
            return Err(PublishError::Closed);
        }
        self.push(Some(message_id.to_string()), payload);
        debug!("Published message {} to {}", message_id, self.name);
        Ok(())
    }
}

/// A consumer of an [`InMemoryQueue`].
pub struct InMemoryDeliverySource {
    queue: InMemoryQueue,
    outstanding: HashSet<u64>,
}

#[async_trait]
impl DeliverySource for InMemoryDeliverySource {
    async fn next_delivery(&mut self) -> Option<Delivery> {
        loop {
            let notified = self.queue.notify.notified();
            tokio::pin!(notified);
            // register before checking so a concurrent push cannot be missed
            notified.as_mut().enable();

            {
                let mut state = self.queue.state.lock();
                if let Some(message) = state.ready.pop_front() {
                    state.next_tag += 1;
                    let delivery_tag = state.next_tag;
                    state.unacked.insert(delivery_tag, message.clone());
                    self.outstanding.insert(delivery_tag);

                    return Some(Delivery {
                        delivery_tag,
                        message_id: message.message_id,
                        redelivered: message.redelivered,
                        body: message.body,
                    });
                }
                if state.shut_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), QueueError> {
        self.queue.take_unacked(delivery_tag)?;
        self.outstanding.remove(&delivery_tag);
        self.queue.state.lock().acked += 1;
        Ok(())
    }

    async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), QueueError> {
        let message = self.queue.take_unacked(delivery_tag)?;
        self.outstanding.remove(&delivery_tag);
        self.queue.state.lock().nacked += 1;
        if requeue {
            self.queue.requeue(message);
        }
        Ok(())
    }

    async fn close(self) -> Result<(), QueueError> {
        for tag in self.outstanding {
            if let Ok(message) = self.queue.take_unacked(tag) {
                self.queue.requeue(message);
            }
        }
        Ok(())
    }
}
