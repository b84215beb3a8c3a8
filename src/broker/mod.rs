//! The capability a [`Consumer`](crate::consumers::Consumer) needs from a message broker:
//! a channel that yields deliveries and accepts acknowledgements.
//!
//! Two implementations are provided:
//! - [`LapinChannel`], talking AMQP 0.9.1 to RabbitMq via `lapin`;
//! - [`InMemoryChannel`], backed by an [`InMemoryBroker`] living in the same process.
//!   Useful for tests and local experiments.
use crate::consumers::Delivery;
use amq_protocol_types::DeliveryTag;

pub use error::{AcknowledgeError, SubscriptionError, TransportError};
pub use in_memory::{InMemoryBroker, InMemoryChannel};
pub use rabbit_mq::{LapinChannel, LapinChannelOptions};

mod error;
mod in_memory;
mod rabbit_mq;

/// A channel session with a message broker.
///
/// A `BrokerChannel` is exclusively owned by a single [`Consumer`](crate::consumers::Consumer):
/// it is never shared, nor called concurrently.
///
/// # Contract
///
/// - [`subscribe`](BrokerChannel::subscribe) is called exactly once, before anything else.
/// - [`next_delivery`](BrokerChannel::next_delivery) yields deliveries in the order the broker
///   sends them. `None` means the broker closed the subscription, `Some(Err(_))` means the
///   session is broken for good.
/// - [`acknowledge`](BrokerChannel::acknowledge) and [`reject`](BrokerChannel::reject) are
///   called at most once per delivery tag. Implementations are not required to be idempotent.
/// - [`stop_receiving`](BrokerChannel::stop_receiving) ends the session. Deliveries that were
///   not acknowledged are left to the broker's redelivery mechanism.
///
/// There is no retry or reconnection logic at this level: a failure is reported as it is.
#[async_trait::async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    /// Register interest in the deliveries of `queue_name`.
    async fn subscribe(&mut self, queue_name: &str) -> Result<(), SubscriptionError>;

    /// Wait for the next delivery.
    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>>;

    /// Mark a delivery as successfully processed.
    async fn acknowledge(&self, delivery_tag: DeliveryTag) -> Result<(), AcknowledgeError>;

    /// Hand a delivery back to the broker without acknowledging it.
    ///
    /// The broker puts it back in the queue if `requeue` is `true`, it drops it (or
    /// dead-letters it) otherwise.
    async fn reject(&self, delivery_tag: DeliveryTag, requeue: bool)
        -> Result<(), AcknowledgeError>;

    /// Stop receiving deliveries and release the session.
    async fn stop_receiving(&mut self) -> Result<(), TransportError>;
}
