//! A collection of failure hooks.

use crate::consumers::{Delivery, FailureAction, FailureHook, Stage};

/// Leave failed deliveries unacknowledged: they are redelivered once the channel session ends.
///
/// Each of them holds a slot of the prefetch window until then. With a prefetch count of `n`,
/// the consumer stops receiving deliveries after `n` failures: pair this hook with
/// [`ConsumerBuilder::with_prefetch_count`].
///
/// [`ConsumerBuilder::with_prefetch_count`]: crate::consumers::ConsumerBuilder::with_prefetch_count
pub struct LeaveUnacknowledged;

#[async_trait::async_trait]
impl FailureHook for LeaveUnacknowledged {
    async fn on_failure(&self, _delivery: &Delivery, _stage: Stage) -> FailureAction {
        FailureAction::LeaveUnacknowledged
    }
}

/// Requeue failed deliveries straight away.
pub struct AlwaysRequeue;

#[async_trait::async_trait]
impl FailureHook for AlwaysRequeue {
    async fn on_failure(&self, _delivery: &Delivery, _stage: Stage) -> FailureAction {
        FailureAction::Requeue
    }
}

/// Reject failed deliveries, without requeueing them. This is the default.
pub struct AlwaysReject;

#[async_trait::async_trait]
impl FailureHook for AlwaysReject {
    async fn on_failure(&self, _delivery: &Delivery, _stage: Stage) -> FailureAction {
        FailureAction::Reject
    }
}
