use crate::broker::{AcknowledgeError, BrokerChannel, SubscriptionError, TransportError};
use crate::consumers::Delivery;
use amq_protocol_types::DeliveryTag;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, Notify};

// Same as `LapinChannel`'s default.
const DEFAULT_PREFETCH_COUNT: usize = 1;

enum Event {
    Delivery(Delivery),
    Failure(String),
}

struct Queue {
    /// `None` once the queue has been closed: receivers drain what is buffered, then end.
    sender: Option<mpsc::UnboundedSender<Event>>,
    /// `None` while a channel is subscribed to the queue.
    receiver: Option<mpsc::UnboundedReceiver<Event>>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, Queue>,
    last_delivery_tag: DeliveryTag,
    acknowledged: Vec<DeliveryTag>,
    requeued: Vec<DeliveryTag>,
    rejected: Vec<DeliveryTag>,
}

impl BrokerState {
    fn enqueue(&mut self, queue_name: &str, delivery: Delivery) -> Result<(), anyhow::Error> {
        let sender = self
            .queues
            .get(queue_name)
            .ok_or_else(|| anyhow::anyhow!("Queue `{queue_name}` does not exist."))?
            .sender
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Queue `{queue_name}` has been closed."))?;
        sender
            .send(Event::Delivery(delivery))
            .map_err(|_| anyhow::anyhow!("Queue `{queue_name}` has been closed."))
    }

    fn next_delivery_tag(&mut self) -> DeliveryTag {
        self.last_delivery_tag += 1;
        self.last_delivery_tag
    }
}

/// A message broker living in the current process.
///
/// Cloning an `InMemoryBroker` gives you another handle to the same broker: publish from one
/// handle, consume through a channel opened on another.
///
/// Delivery tags are assigned on publish, starting from 1.
/// Deliveries that were received but neither acknowledged nor rejected when a channel stops
/// receiving (or is dropped) are put back in their queue, flagged as redelivered.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create `queue_name`, if it does not exist yet.
    pub fn declare_queue(&self, queue_name: &str) {
        self.state()
            .queues
            .entry(queue_name.to_owned())
            .or_insert_with(|| {
                let (sender, receiver) = mpsc::unbounded_channel();
                Queue {
                    sender: Some(sender),
                    receiver: Some(receiver),
                }
            });
    }

    /// Publish `payload` to `queue_name`, returning the tag it will be delivered with.
    pub fn publish(
        &self,
        queue_name: &str,
        payload: impl Into<Vec<u8>>,
    ) -> Result<DeliveryTag, anyhow::Error> {
        let mut state = self.state();
        let delivery_tag = state.next_delivery_tag();
        state.enqueue(queue_name, Delivery::new(delivery_tag, payload))?;
        Ok(delivery_tag)
    }

    /// Break the session of the channel consuming from `queue_name`: its next attempt to
    /// receive a delivery fails with `message`, after the deliveries already buffered.
    pub fn fail(&self, queue_name: &str, message: &str) -> Result<(), anyhow::Error> {
        let state = self.state();
        let sender = state
            .queues
            .get(queue_name)
            .and_then(|queue| queue.sender.as_ref())
            .ok_or_else(|| anyhow::anyhow!("Queue `{queue_name}` is not open."))?;
        sender
            .send(Event::Failure(message.to_owned()))
            .map_err(|_| anyhow::anyhow!("Queue `{queue_name}` has been closed."))
    }

    /// Close `queue_name`: subscribers receive what is already buffered, then the
    /// subscription ends.
    pub fn close(&self, queue_name: &str) {
        if let Some(queue) = self.state().queues.get_mut(queue_name) {
            queue.sender = None;
        }
    }

    /// The tags acknowledged so far, in acknowledgement order.
    pub fn acknowledged(&self) -> Vec<DeliveryTag> {
        self.state().acknowledged.clone()
    }

    /// The tags handed back to the broker for requeueing so far.
    pub fn requeued(&self) -> Vec<DeliveryTag> {
        self.state().requeued.clone()
    }

    /// The tags rejected without requeueing so far.
    pub fn rejected(&self) -> Vec<DeliveryTag> {
        self.state().rejected.clone()
    }

    /// Open a new channel on this broker, with a prefetch count of 1.
    pub fn channel(&self) -> InMemoryChannel {
        self.channel_with_prefetch(DEFAULT_PREFETCH_COUNT)
    }

    /// Open a new channel that holds at most `prefetch_count` unsettled deliveries.
    ///
    /// Like RabbitMq, the channel stops handing out deliveries while `prefetch_count` of them
    /// are neither acknowledged nor rejected.
    pub fn channel_with_prefetch(&self, prefetch_count: usize) -> InMemoryChannel {
        InMemoryChannel {
            broker: self.clone(),
            queue_name: None,
            receiver: None,
            prefetch_count: prefetch_count.max(1),
            unacknowledged: Mutex::new(HashMap::new()),
            settled: Notify::new(),
        }
    }

    fn redeliver(&self, queue_name: &str, delivery: Delivery) -> Result<(), anyhow::Error> {
        let mut state = self.state();
        let delivery_tag = state.next_delivery_tag();
        let delivery = Delivery {
            delivery_tag,
            ..delivery.redelivered()
        };
        state.enqueue(queue_name, delivery)
    }
}

/// A [`BrokerChannel`] opened on an [`InMemoryBroker`].
///
/// Only one channel at a time can be subscribed to a given queue.
/// Dropping the channel releases its subscription, as [`BrokerChannel::stop_receiving`] does.
pub struct InMemoryChannel {
    broker: InMemoryBroker,
    queue_name: Option<String>,
    receiver: Option<mpsc::UnboundedReceiver<Event>>,
    prefetch_count: usize,
    /// Deliveries received through this channel, waiting for an ack or a rejection.
    unacknowledged: Mutex<HashMap<DeliveryTag, Delivery>>,
    settled: Notify,
}

impl InMemoryChannel {
    fn unacknowledged(&self) -> MutexGuard<'_, HashMap<DeliveryTag, Delivery>> {
        self.unacknowledged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, delivery_tag: DeliveryTag) -> Result<Delivery, AcknowledgeError> {
        let delivery = self.unacknowledged().remove(&delivery_tag).ok_or_else(|| {
            AcknowledgeError::from(anyhow::anyhow!(
                "Unknown delivery tag {delivery_tag}: it was never delivered on this channel \
                or it has already been settled."
            ))
        })?;
        self.settled.notify_one();
        Ok(delivery)
    }

    /// Wait until the prefetch window has room for another delivery.
    async fn prefetch_slot(&self) {
        loop {
            let settled = self.settled.notified();
            if self.unacknowledged().len() < self.prefetch_count {
                return;
            }
            settled.await;
        }
    }

    /// Give the queue back to the broker, requeueing whatever was not settled.
    fn release(&mut self) -> Result<(), anyhow::Error> {
        let (Some(queue_name), Some(receiver)) = (self.queue_name.take(), self.receiver.take())
        else {
            return Ok(());
        };
        // Whatever is still buffered stays in the queue for the next subscriber.
        if let Some(queue) = self.broker.state().queues.get_mut(&queue_name) {
            queue.receiver = Some(receiver);
        }

        let mut unacknowledged: Vec<Delivery> = self
            .unacknowledged()
            .drain()
            .map(|(_, delivery)| delivery)
            .collect();
        unacknowledged.sort_by_key(|delivery| delivery.delivery_tag);
        for delivery in unacknowledged {
            self.broker.redeliver(&queue_name, delivery)?;
        }
        Ok(())
    }
}

impl Drop for InMemoryChannel {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error.message = %e, "Failed to release in-memory channel");
        }
    }
}

#[async_trait::async_trait]
impl BrokerChannel for InMemoryChannel {
    async fn subscribe(&mut self, queue_name: &str) -> Result<(), SubscriptionError> {
        let mut state = self.broker.state();
        let queue = state
            .queues
            .get_mut(queue_name)
            .ok_or_else(|| anyhow::anyhow!("Queue `{queue_name}` does not exist."))?;
        let receiver = queue
            .receiver
            .take()
            .ok_or_else(|| anyhow::anyhow!("Queue `{queue_name}` already has a consumer."))?;
        self.receiver = Some(receiver);
        self.queue_name = Some(queue_name.to_owned());
        Ok(())
    }

    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>> {
        self.receiver.as_ref()?;
        self.prefetch_slot().await;
        match self.receiver.as_mut()?.recv().await? {
            Event::Delivery(delivery) => {
                self.unacknowledged()
                    .insert(delivery.delivery_tag, delivery.clone());
                Some(Ok(delivery))
            }
            Event::Failure(message) => Some(Err(anyhow::anyhow!(message).into())),
        }
    }

    async fn acknowledge(&self, delivery_tag: DeliveryTag) -> Result<(), AcknowledgeError> {
        self.settle(delivery_tag)?;
        self.broker.state().acknowledged.push(delivery_tag);
        Ok(())
    }

    async fn reject(
        &self,
        delivery_tag: DeliveryTag,
        requeue: bool,
    ) -> Result<(), AcknowledgeError> {
        let delivery = self.settle(delivery_tag)?;
        if requeue {
            self.broker.state().requeued.push(delivery_tag);
            if let Some(queue_name) = &self.queue_name {
                self.broker.redeliver(queue_name, delivery)?;
            }
        } else {
            self.broker.state().rejected.push(delivery_tag);
        }
        Ok(())
    }

    async fn stop_receiving(&mut self) -> Result<(), TransportError> {
        Ok(self.release()?)
    }
}
