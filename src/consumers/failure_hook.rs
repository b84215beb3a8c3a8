use crate::consumers::{Delivery, Stage};

#[async_trait::async_trait]
/// A hook to decide what happens to a delivery whose pipeline failed.
///
/// # Use case
///
/// A delivery that failed processing is never acknowledged. By default it is rejected
/// ([`FailureAction::Reject`]): if a [dead letter exchange](https://www.rabbitmq.com/dlx.html)
/// is configured for the queue, it is routed there, otherwise it is dropped.
///
/// Depending on the failure, you might prefer to hand it back to the broker for another
/// attempt ([`FailureAction::Requeue`]). Beware of poison messages: a requeued delivery goes
/// back to the head of the queue and comes back straight away.
///
/// [`FailureAction::LeaveUnacknowledged`] leaves the delivery to the broker's redelivery
/// mechanism, once the channel session ends. Until then it holds a slot of the channel's
/// prefetch window: once the window is full the broker stops pushing deliveries and the
/// consumer stalls.
///
/// # Plug and play implementations
///
/// You can find three ready-to-go hooks in the [`hooks::failure`] module -
/// [`LeaveUnacknowledged`], [`AlwaysRequeue`] and [`AlwaysReject`].
///
/// [`hooks::failure`]: crate::consumers::hooks::failure
/// [`LeaveUnacknowledged`]: crate::consumers::hooks::failure::LeaveUnacknowledged
/// [`AlwaysRequeue`]: crate::consumers::hooks::failure::AlwaysRequeue
/// [`AlwaysReject`]: crate::consumers::hooks::failure::AlwaysReject
pub trait FailureHook: Send + Sync + 'static {
    /// `stage` is the pipeline stage that failed for `delivery`.
    async fn on_failure(&self, delivery: &Delivery, stage: Stage) -> FailureAction;
}

/// assert it's object safe
type _CHECK = Box<dyn FailureHook>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What to do with a delivery that failed processing.
///
/// None of the options acknowledges the delivery.
pub enum FailureAction {
    /// Do not tell the broker anything.
    LeaveUnacknowledged,
    /// Negative acknowledgement: the broker puts the message back in the queue.
    Requeue,
    /// The broker drops the message, or dead-letters it if the queue is configured to.
    Reject,
}
