use crate::broker::{SubscriptionError, TransportError};
use crate::consumers::ConsumerState;
use std::fmt;

/// The error returned when a pipeline stage fails to process a delivery.
///
/// It carries the stage that failed on top of the error returned by the [`Pipeline`], for
/// our observability needs.
///
/// [`Pipeline`]: crate::consumers::Pipeline
#[derive(Debug)]
pub struct StageError<E> {
    /// The stage that failed.
    pub stage: Stage,
    /// The underlying error returned by the pipeline.
    pub inner_error: E,
}

impl<E> StageError<E> {
    pub fn new(stage: Stage, inner_error: E) -> Self {
        Self { stage, inner_error }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for StageError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner_error)
    }
}

impl<E: fmt::Display> fmt::Display for StageError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The {} stage failed to process the delivery", self.stage)?;
        write!(f, ".\n{}", self.inner_error)
    }
}

/// The three stages of a [`Pipeline`](crate::consumers::Pipeline), in execution order.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Stage {
    /// The raw payload could not be decoded.
    Extract,
    /// The extracted data could not be converted into the shape `execute` expects.
    Adapt,
    /// The business logic failed.
    Execute,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extract => write!(f, "extract"),
            Self::Adapt => write!(f, "adapt"),
            Self::Execute => write!(f, "execute"),
        }
    }
}

/// A [`Consumer`](crate::consumers::Consumer) could not be built.
///
/// Connection errors are fatal: the consumer must be built again from scratch.
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    /// The broker address could not be parsed.
    #[error("`{address}` is not a valid broker address.")]
    InvalidAddress {
        address: String,
        #[source]
        source: anyhow::Error,
    },
    /// We failed to establish a connection or to open a channel with the broker.
    #[error("Failed to connect to the message broker.")]
    Unreachable(#[source] TransportError),
    /// The broker refused to register the consumer on the queue.
    #[error("Failed to subscribe to queue `{queue_name}`.")]
    Subscription {
        queue_name: String,
        #[source]
        source: SubscriptionError,
    },
}

/// The consuming loop of a [`Consumer`](crate::consumers::Consumer) terminated abnormally.
#[derive(thiserror::Error, Debug)]
pub enum ConsumerError {
    /// `start` was called on a consumer that is not in the `Connected` state.
    #[error("A consumer cannot start from the `{0}` state.")]
    NotConnected(ConsumerState),
    /// The channel with the broker failed while consuming.
    #[error("The channel with the message broker failed while consuming.")]
    Transport(#[from] TransportError),
}
