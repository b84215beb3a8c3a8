use amq_protocol_types::FieldTable;
use lapin::Channel;

#[async_trait::async_trait]
/// A hook to execute logic against RabbitMq before a [`LapinChannel`] subscribes to its queue.
///
/// # Use case
///
/// Who is in charge of creating the queue a worker consumes from? What about its dead letter
/// exchange?
///
/// Depending on your setup, this might be done via Terraform or manually.
/// Often, though, it is preferable to have workers in charge of creating the objects they
/// rely on.
///
/// A pre-start hook gives you access to the channel, allowing you to perform actions against
/// the message broker before the consumer registers on the queue.
/// Without any pre-start hook, subscribing to a queue that does not exist fails.
///
/// Check out [`hooks::pre_start`] for ready-made hooks.
///
/// [`LapinChannel`]: crate::broker::LapinChannel
/// [`hooks::pre_start`]: crate::consumers::hooks::pre_start
pub trait ConsumerPreStartHook: Send + Sync + 'static {
    async fn run(
        &self,
        channel: &Channel,
        queue_name: &str,
        queue_args: FieldTable,
    ) -> Result<(), anyhow::Error>;
}

/// assert it's object safe
type _CHECK = Box<dyn ConsumerPreStartHook>;
