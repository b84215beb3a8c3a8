//! Facilities to consume messages from a queue and process them through a [`Pipeline`].
//! Check out [`Consumer`] as a starting point.
pub use consumer::{Consumer, ConsumerBuilder};
pub use delivery::Delivery;
pub use error::{ConnectionError, ConsumerError, Stage, StageError};
pub use failure_hook::{FailureAction, FailureHook};
pub use observer::DeliveryObserver;
pub use outcome::{BrokerAction, DispatchOutcome, ProcessingError};
pub use pipeline::{ExecuteOnly, Executor, Pipeline};
pub use pre_start_hook::ConsumerPreStartHook;
pub use state::{ConsumerState, StopHandle};

mod consumer;
mod delivery;
mod error;
mod failure_hook;
pub mod hooks;
mod observer;
mod outcome;
mod pipeline;
mod pre_start_hook;
mod state;
