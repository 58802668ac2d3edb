//! # **rill** 的 Redis Streams 实现
//!
//!

pub mod broker;

pub use broker::RedisBroker;
