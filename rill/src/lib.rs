//! # **rill** 核心库
//!
//!

#![warn(missing_docs)]

pub mod broker;
pub mod consumer;
pub mod errors;
pub mod record;
pub mod stream;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
pub(crate) mod tests;

/// # **rill** 宏
pub mod macros {
    pub use rill_macros::*;
}

pub use broker::{Broker, RawEntry, StreamBatch, TAIL};
pub use consumer::{Consumer, ConsumerConfig, ConsumerState, RetryPolicy};
pub use record::{FieldIssue, Message, Record, Scalar};
pub use stream::Stream;
