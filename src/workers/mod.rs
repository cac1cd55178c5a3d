//! Producer and consumer workers.
//!
//! Both kinds of worker are plain structs with an async `run` method that the
//! pipeline spawns once per worker. They share nothing with their siblings
//! except channel handles.

pub mod consumer;
pub mod producer;

pub use consumer::{Consumer, ConsumerStats};
pub use producer::{Producer, ProducerStats};
