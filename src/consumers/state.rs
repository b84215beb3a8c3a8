use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// The lifecycle of a [`Consumer`](crate::consumers::Consumer).
///
/// ```text
/// Created --(subscribed)--> Connected --(start)--> Running --(stop)--> Stopped
/// ```
///
/// `stop` can also be requested while `Connected`: the consumer goes straight to `Stopped`.
/// `Stopped` is terminal.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConsumerState {
    Created,
    Connected,
    Running,
    Stopped,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Connected => write!(f, "connected"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// A cloneable handle to stop a [`Consumer`](crate::consumers::Consumer) from another task
/// or thread while [`Consumer::start`](crate::consumers::Consumer::start) is running.
///
/// Stopping is cooperative: the delivery being processed (if any) runs to completion,
/// including its acknowledgement, and no further delivery is dispatched afterwards.
#[derive(Clone, Debug)]
pub struct StopHandle {
    state: Arc<watch::Sender<ConsumerState>>,
}

impl StopHandle {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(ConsumerState::Created);
        Self {
            state: Arc::new(sender),
        }
    }

    /// Request the consumer to stop.
    ///
    /// The consuming loop checks for a stop request right before dispatching each delivery.
    /// A `stop` issued from another thread while that check is in progress can land after it:
    /// the delivery that passed the check is still processed. Nothing is dispatched after the
    /// loop has observed the request.
    ///
    /// Calling `stop` on a consumer that is already stopped is a no-op.
    pub fn stop(&self) {
        let stopped_now = self.state.send_if_modified(|state| match state {
            ConsumerState::Stopped => false,
            _ => {
                *state = ConsumerState::Stopped;
                true
            }
        });
        if stopped_now {
            tracing::info!("Stopping consumer");
        }
    }

    /// The current state of the consumer.
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ConsumerState::Stopped
    }

    /// Move from `from` to `to`, atomically.
    ///
    /// It returns the current state if it is not `from`.
    pub(crate) fn transition(
        &self,
        from: ConsumerState,
        to: ConsumerState,
    ) -> Result<(), ConsumerState> {
        let mut current = from;
        let moved = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                current = *state;
                false
            }
        });
        if moved {
            tracing::debug!(%from, %to, "Consumer state transition");
            Ok(())
        } else {
            Err(current)
        }
    }

    /// Resolves once the consumer has been asked to stop.
    pub(crate) async fn stopped(&self) {
        let mut receiver = self.state.subscribe();
        loop {
            if *receiver.borrow_and_update() == ConsumerState::Stopped {
                return;
            }
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}
