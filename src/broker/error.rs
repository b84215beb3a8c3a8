/// The broker refused to register a consumer on the requested queue
/// (e.g. the queue does not exist).
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct SubscriptionError(#[from] anyhow::Error);

/// The underlying channel or connection with the broker failed.
///
/// Transport errors are unrecoverable for the session they happen in.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct TransportError(#[from] anyhow::Error);

/// The broker could not process an acknowledgement (or a rejection) for a delivery
/// (e.g. the delivery tag is stale or the channel has been closed).
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct AcknowledgeError(#[from] anyhow::Error);

impl From<lapin::Error> for SubscriptionError {
    fn from(err: lapin::Error) -> Self {
        Self(err.into())
    }
}

impl From<lapin::Error> for TransportError {
    fn from(err: lapin::Error) -> Self {
        Self(err.into())
    }
}

impl From<lapin::Error> for AcknowledgeError {
    fn from(err: lapin::Error) -> Self {
        Self(err.into())
    }
}
