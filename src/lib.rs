//! `carrot-worker` is a framework for queue workers, built on top of [`lapin`],
//! to make it easy and ergonomic to process messages from RabbitMq.
//!
//! A worker is a [`Pipeline`](crate::consumers::Pipeline) - extract, adapt, execute - driven by a
//! [`Consumer`](crate::consumers::Consumer), which takes care of talking to the broker and
//! acknowledges each message once, and only once, it has been processed successfully.
//!
//! ```no_run
//! use carrot_worker::consumers::{Consumer, ExecuteOnly};
//!
//! async fn print(payload: Vec<u8>) -> Result<(), std::str::Utf8Error> {
//!     println!("{}", std::str::from_utf8(&payload)?);
//!     Ok(())
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut consumer = Consumer::connect("localhost", "jobs", ExecuteOnly(print)).await?;
//! let stop_handle = consumer.stop_handle();
//! // Call `stop_handle.stop()` from another task to exit the loop.
//! # drop(stop_handle);
//! consumer.start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The broker is abstracted behind [`BrokerChannel`](crate::broker::BrokerChannel):
//! [`InMemoryBroker`](crate::broker::InMemoryBroker) lets you run workers without RabbitMq.

pub mod amqp;
pub mod broker;
pub mod consumers;
