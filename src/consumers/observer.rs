use crate::consumers::{Delivery, DispatchOutcome};

/// Observers get **read-only** access to each delivery and to the outcome of its processing.
///
/// # Use case
///
/// The consumer logs every failure on its own. Observers are the place to plug in anything
/// else an operator needs to know about: metrics, alerting on acknowledgement failures,
/// test assertions, etc.
///
/// `on_outcome` runs after **all** the processing has taken place, including the
/// acknowledgement (or rejection) with the broker.
///
/// # Blocking
///
/// Observers are invoked inline by the consuming loop: keep them cheap.
/// They cannot alter the outcome of processing.
pub trait DeliveryObserver<Error>: Send + Sync + 'static {
    /// Invoked before the pipeline starts working on `delivery`.
    fn on_delivery(&self, _delivery: &Delivery) {}

    /// Invoked once `delivery` has been fully handled.
    fn on_outcome(&self, _delivery: &Delivery, _outcome: &DispatchOutcome<Error>) {}
}
