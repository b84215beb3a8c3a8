use crate::broker::AcknowledgeError;
use crate::consumers::StageError;
use amq_protocol_types::DeliveryTag;

/// The outcome of dispatching a delivery:
/// - extract, adapt and execute;
/// - ack (on success) or the failure hook's decision (on failure) against the broker.
///
/// [`DispatchOutcome`] is what [`DeliveryObserver`]s get to look at once a delivery has been
/// fully handled.
///
/// # Why a struct?
///
/// [`DispatchOutcome`] does not expose any constructor: observers can inspect it but they
/// cannot build or alter one.
///
/// [`DeliveryObserver`]: crate::consumers::DeliveryObserver
#[derive(Debug)]
pub struct DispatchOutcome<Error> {
    pub(super) delivery_tag: DeliveryTag,
    pub(super) outcome: Result<(), ProcessingError<Error>>,
    pub(super) broker_action: Option<BrokerAction>,
}

impl<Error> DispatchOutcome<Error> {
    pub fn delivery_tag(&self) -> DeliveryTag {
        self.delivery_tag
    }

    pub fn result(&self) -> &Result<(), ProcessingError<Error>> {
        &self.outcome
    }

    /// The instruction we sent to the broker for this delivery, if any.
    ///
    /// It is returned even if we experienced an issue when dispatching the instruction to the
    /// broker (e.g. network timeout).
    pub fn broker_action(&self) -> Option<BrokerAction> {
        self.broker_action
    }

    /// Returns `true` if the broker confirmed the acknowledgement of the delivery.
    pub fn was_acknowledged(&self) -> bool {
        self.broker_action == Some(BrokerAction::Ack) && self.outcome.is_ok()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProcessingError<Error> {
    /// One of the pipeline stages failed. The delivery was not acknowledged.
    #[error("The processing pipeline failed.")]
    Pipeline(StageError<Error>),
    /// The pipeline completed but the broker did not accept the acknowledgement.
    ///
    /// The work has been done: expect the delivery to be processed again.
    #[error("Failed to acknowledge the delivery.")]
    AckError(#[source] AcknowledgeError),
    /// The pipeline failed and we could not requeue or reject the delivery.
    #[error("Failed to hand the failed delivery back to the broker.")]
    RejectError {
        #[source]
        error: AcknowledgeError,

        /// The failure that led us to requeue or reject the delivery.
        stage_error: StageError<Error>,
    },
}

impl<Error> ProcessingError<Error> {
    /// The pipeline failure behind this error, if any.
    pub fn stage_error(&self) -> Option<&StageError<Error>> {
        match self {
            Self::Pipeline(e) => Some(e),
            Self::RejectError { stage_error, .. } => Some(stage_error),
            Self::AckError(_) => None,
        }
    }
}

/// The instruction we sent to the broker when finalising the processing of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerAction {
    /// Positive acknowledgement - the message can be removed from the queue.
    /// This only happens if the pipeline completed successfully.
    Ack,
    /// Negative acknowledgement - the message should be requeued to retry processing.
    Requeue,
    /// Rejection. The message should NOT be requeued.
    /// The message will be sent to the dead letter exchange if configured.
    Reject,
}
