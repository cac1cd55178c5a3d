//! # Bounded widget pipeline with race-free shutdown
//!
//! This crate manufactures sequentially numbered widgets with a pool of
//! producers, streams them through a fixed-capacity channel to a pool of
//! consumers, and shuts everything down cleanly once a consumer detects the
//! designated broken widget.
//!
//! ## Core Concepts
//!
//! - **ID Issuer**: the single task that grants unique, increasing identifiers
//!   and can be stopped
//! - **Producer**: turns each granted identifier into a [`Widget`]
//! - **Item Channel**: bounded FIFO between producers and consumers
//! - **Consumer**: reports every widget to a [`ReportSink`] and stops the
//!   issuer when it sees the broken one
//! - **Pipeline**: spawns everything and owns the shutdown order
//!
//! Every identifier that is ever issued reaches exactly one consumer.
//!
//! ## Example
//!
//! ```rust
//! use widgetline::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::new()
//!         .producers(2)
//!         .consumers(2)
//!         .total_widgets(10)
//!         .bad_widget(5);
//!
//!     let sink = CollectSink::new();
//!     let summary = Pipeline::new(config).sink(sink.clone()).run().await?;
//!
//!     assert_eq!(summary.consumed, summary.produced);
//!     assert_eq!(sink.reports().await.iter().filter(|r| r.is_broken()).count(), 1);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod issuer;
pub mod pipeline;
pub mod sinks;
pub mod traits;
pub mod widget;
pub mod workers;

// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::issuer::{Grant, IdClient, IdIssuer, StopHandle};
    pub use crate::pipeline::{run, run_blocking, Pipeline, PipelineConfig, RunSummary, StopPolicy};
    pub use crate::sinks::*;
    pub use crate::traits::ReportSink;
    pub use crate::widget::{ProducerId, Report, Widget};
}

pub use error::{Error, Result};
pub use pipeline::{run, run_blocking, Pipeline, PipelineConfig, RunSummary, StopPolicy};
pub use traits::ReportSink;
pub use widget::{Report, Widget};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
