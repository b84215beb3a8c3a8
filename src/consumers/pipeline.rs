//! The `Pipeline` trait: what a [`Consumer`](crate::consumers::Consumer) runs on each delivery.
use std::fmt::{Debug, Display};
use std::future::Future;

/// Implementers of the `Pipeline` trait describe how a worker processes the messages it
/// retrieves from a queue.
///
/// Each delivery goes through three stages, strictly in order:
///
/// 1. [`extract`](Pipeline::extract) decodes the raw payload into a structured form
///    (e.g. deserializing JSON);
/// 2. [`adapt`](Pipeline::adapt) turns the extracted data into the representation the business
///    logic expects;
/// 3. [`execute`](Pipeline::execute) performs the actual work.
///
/// # Scope
///
/// A pipeline does not get access to the underlying broker channel.
/// The framework acknowledges the delivery if, and only if, all three stages succeed.
/// If any stage fails, the delivery is never acknowledged: what happens to it afterwards
/// is decided by the [`FailureHook`](crate::consumers::FailureHook) configured on the consumer.
///
/// # Single-stage workers
///
/// If all your logic lives in `execute`, implement [`Executor`] instead and wrap it in
/// [`ExecuteOnly`]: extract and adapt become identity transforms over the raw payload.
#[async_trait::async_trait]
pub trait Pipeline: Send + Sync + 'static {
    /// The output of [`extract`](Pipeline::extract).
    type Extracted: Send;
    /// The output of [`adapt`](Pipeline::adapt), consumed by [`execute`](Pipeline::execute).
    type Output: Send;
    /// The error returned by any of the three stages.
    type Error: Debug + Display + Send + Sync + 'static;

    async fn extract(&self, payload: &[u8]) -> Result<Self::Extracted, Self::Error>;

    async fn adapt(&self, extracted: Self::Extracted) -> Result<Self::Output, Self::Error>;

    async fn execute(&self, output: Self::Output) -> Result<(), Self::Error>;
}

/// The business logic of a single-stage worker, fed with the raw payload of each delivery.
///
/// `Executor` is implemented for all async functions of the form:
/// ```ignore
/// async fn(payload: Vec<u8>) -> Result<(), E>;
/// ```
#[async_trait::async_trait]
pub trait Executor: Send + Sync + 'static {
    type Error: Debug + Display + Send + Sync + 'static;

    async fn execute(&self, payload: Vec<u8>) -> Result<(), Self::Error>;
}

#[async_trait::async_trait]
impl<F, Fut, E> Executor for F
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Debug + Display + Send + Sync + 'static,
{
    type Error = E;

    async fn execute(&self, payload: Vec<u8>) -> Result<(), E> {
        (self)(payload).await
    }
}

/// Wrapper type to turn an [`Executor`] into a [`Pipeline`] with identity extract/adapt stages.
pub struct ExecuteOnly<X>(pub X);

#[async_trait::async_trait]
impl<X> Pipeline for ExecuteOnly<X>
where
    X: Executor,
{
    type Extracted = Vec<u8>;
    type Output = Vec<u8>;
    type Error = X::Error;

    async fn extract(&self, payload: &[u8]) -> Result<Vec<u8>, X::Error> {
        Ok(payload.to_vec())
    }

    async fn adapt(&self, extracted: Vec<u8>) -> Result<Vec<u8>, X::Error> {
        Ok(extracted)
    }

    async fn execute(&self, output: Vec<u8>) -> Result<(), X::Error> {
        self.0.execute(output).await
    }
}
