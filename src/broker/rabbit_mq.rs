use crate::amqp::ConnectionFactory;
use crate::broker::{AcknowledgeError, BrokerChannel, SubscriptionError, TransportError};
use crate::consumers::{ConsumerPreStartHook, Delivery};
use amq_protocol_types::{AMQPValue, DeliveryTag, FieldTable};
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions,
    BasicRejectOptions,
};
use std::sync::Arc;
use uuid::Uuid;

// A worker processes one delivery at a time: anything above 1 only sits in the channel buffer.
// Deliveries left unacknowledged after a failure hold a slot each until the session ends.
const DEFAULT_PREFETCH_COUNT: u16 = 1;

/// Knobs to tune how a [`LapinChannel`] registers on its queue.
#[derive(Clone)]
pub struct LapinChannelOptions {
    /// The maximum number of unacknowledged deliveries RabbitMq pushes to the channel.
    /// Defaults to 1.
    ///
    /// RabbitMq stops pushing deliveries once `prefetch_count` of them are unacknowledged: raise
    /// it if you rely on [`LeaveUnacknowledged`].
    ///
    /// [`LeaveUnacknowledged`]: crate::consumers::hooks::failure::LeaveUnacknowledged
    pub prefetch_count: u16,
    /// Consumer priority. See https://www.rabbitmq.com/consumer-priority.html.
    pub priority: Option<i32>,
    /// Options passed to `basic.consume`.
    pub consume_options: BasicConsumeOptions,
    /// Hooks executed, in order, before registering on the queue.
    pub pre_start_hooks: Vec<Arc<dyn ConsumerPreStartHook>>,
}

impl Default for LapinChannelOptions {
    fn default() -> Self {
        Self {
            prefetch_count: DEFAULT_PREFETCH_COUNT,
            priority: None,
            consume_options: BasicConsumeOptions::default(),
            pre_start_hooks: Vec::new(),
        }
    }
}

/// A [`BrokerChannel`] backed by a dedicated RabbitMq connection.
pub struct LapinChannel {
    connection: lapin::Connection,
    channel: lapin::Channel,
    options: LapinChannelOptions,
    /// Set once we have successfully subscribed to a queue.
    consumer: Option<lapin::Consumer>,
    closed: bool,
}

impl LapinChannel {
    /// Open a new connection with RabbitMq and a channel on top of it.
    #[tracing::instrument(skip_all, name = "open_channel", fields(host = %factory.host()))]
    pub async fn open(
        factory: &ConnectionFactory,
        options: LapinChannelOptions,
    ) -> Result<Self, TransportError> {
        let (connection, channel) = factory.open_channel(options.prefetch_count).await?;
        Ok(Self {
            connection,
            channel,
            options,
            consumer: None,
            closed: false,
        })
    }
}

#[async_trait::async_trait]
impl BrokerChannel for LapinChannel {
    async fn subscribe(&mut self, queue_name: &str) -> Result<(), SubscriptionError> {
        for hook in &self.options.pre_start_hooks {
            hook.run(&self.channel, queue_name, FieldTable::default())
                .await?;
        }

        let mut arguments = FieldTable::default();
        if let Some(priority) = self.options.priority {
            arguments.insert("x-priority".into(), AMQPValue::LongInt(priority));
        }
        let consumer = self
            .channel
            .basic_consume(
                queue_name,
                &Uuid::new_v4().to_string(),
                self.options.consume_options,
                arguments,
            )
            .await?;
        self.consumer = Some(consumer);
        Ok(())
    }

    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>> {
        let consumer = self.consumer.as_mut()?;
        consumer
            .next()
            .await
            .map(|event| event.map(Delivery::from).map_err(TransportError::from))
    }

    async fn acknowledge(&self, delivery_tag: DeliveryTag) -> Result<(), AcknowledgeError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions { multiple: false })
            .await?;
        Ok(())
    }

    async fn reject(
        &self,
        delivery_tag: DeliveryTag,
        requeue: bool,
    ) -> Result<(), AcknowledgeError> {
        if requeue {
            // Put the message back to the queue
            self.channel
                .basic_nack(
                    delivery_tag,
                    BasicNackOptions {
                        multiple: false,
                        requeue: true,
                    },
                )
                .await?;
        } else {
            // Remove the message from the queue and send it to the DLQ (if configured)
            self.channel
                .basic_reject(delivery_tag, BasicRejectOptions { requeue: false })
                .await?;
        }
        Ok(())
    }

    async fn stop_receiving(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(consumer) = self.consumer.take() {
            self.channel
                .basic_cancel(consumer.tag().as_str(), BasicCancelOptions::default())
                .await?;
        }
        // Closing the channel hands prefetched and unacknowledged deliveries back to the queue.
        self.channel.close(200, "Consumer stopped").await?;
        self.connection.close(200, "Consumer stopped").await?;
        Ok(())
    }
}
