//! A collection of pre-start hooks.
//!
//! ```
//! use carrot_worker::consumers::hooks::pre_start::{DeclareDurableQueue, WithDeadLetterQueue};
//!
//! // we want to declare a durable queue that publishers will
//! // publish to directly, no bindings or exchanges required.
//! let pre_start_hook = DeclareDurableQueue;
//! # drop(pre_start_hook);
//!
//! // the same queue, but rejected messages end up in `<queue_name>.deadletter`
//! let pre_start_hook = WithDeadLetterQueue(DeclareDurableQueue);
//! # drop(pre_start_hook);
//! ```

use crate::consumers::ConsumerPreStartHook;
use amq_protocol_types::{AMQPValue, FieldTable};
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::{Channel, ExchangeKind};

/// Declare a durable queue to consume from.
#[derive(Clone)]
pub struct DeclareDurableQueue;

#[async_trait::async_trait]
impl ConsumerPreStartHook for DeclareDurableQueue {
    async fn run(
        &self,
        channel: &Channel,
        queue_name: &str,
        queue_args: FieldTable,
    ) -> Result<(), anyhow::Error> {
        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    passive: false,
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    nowait: false,
                },
                queue_args,
            )
            .await?;
        Ok(())
    }
}

/// Pre-start hook wrapping another pre-start hook with a
/// [dead letter exchange](https://www.rabbitmq.com/dlx.html).
///
/// Specifically, it creates the durable queue `<queue_name>.deadletter`, bound to the fanout
/// exchange `<queue_name>.deadletter`, and marks `<queue_name>.deadletter` as the dead letter
/// exchange for the queue.
/// Combine it with [`AlwaysReject`] to park poison messages instead of redelivering them.
///
/// Given that AMQP queue's settings are immutable,
/// switching from `PreStartHook` to `WithDeadLetterQueue<PreStartHook>`
/// requires rolling a new queue.
///
/// [`AlwaysReject`]: crate::consumers::hooks::failure::AlwaysReject
pub struct WithDeadLetterQueue<H: ConsumerPreStartHook>(pub H);

#[async_trait::async_trait]
impl<H: ConsumerPreStartHook> ConsumerPreStartHook for WithDeadLetterQueue<H> {
    async fn run(
        &self,
        channel: &Channel,
        queue_name: &str,
        mut queue_args: FieldTable,
    ) -> Result<(), anyhow::Error> {
        let dead_letter = format!("{queue_name}.deadletter");

        channel
            .exchange_declare(
                &dead_letter,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    passive: false,
                    durable: true,
                    auto_delete: false,
                    internal: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await?;
        DeclareDurableQueue
            .run(channel, &dead_letter, FieldTable::default())
            .await?;
        channel
            .queue_bind(
                &dead_letter,
                &dead_letter,
                "",
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await?;

        queue_args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(dead_letter.into()),
        );
        self.0.run(channel, queue_name, queue_args).await
    }
}
