//! Pipeline orchestration and shutdown.
//!
//! This module wires the ID issuer, the producer pool and the consumer pool
//! together and owns the shutdown order:
//!
//! 1. wait for every producer to stop,
//! 2. close the item channel,
//! 3. wait for every consumer to drain it,
//! 4. reap the issuer.
//!
//! The item channel is never closed while a producer may still send, and a
//! run never returns while a worker is still alive.

pub mod config;

pub use config::{PipelineConfig, StopPolicy, DEFAULT_CAPACITY, MAX_CAPACITY};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::{Error, Result};
use crate::issuer::{IdIssuer, IssuerReport};
use crate::sinks::LogSink;
use crate::traits::ReportSink;
use crate::workers::{Consumer, ConsumerStats, Producer, ProducerStats};

/// What happened during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    /// Identifiers granted by the issuer
    pub ids_issued: u64,
    /// Widgets pushed into the item channel
    pub produced: u64,
    /// Widgets taken off the item channel and reported
    pub consumed: u64,
    /// Broken widgets seen by consumers
    pub broken: u64,
    /// Stop signals sent by consumers
    pub stop_requests: u64,
    /// Whether a stop signal cut issuance short
    pub stopped_early: bool,
    /// Wall time of the whole run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Every issued identifier was produced and consumed exactly once
    pub fn is_complete(&self) -> bool {
        self.ids_issued == self.produced && self.produced == self.consumed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "issued={} produced={} consumed={} broken={} stopped_early={} elapsed={:?}",
            self.ids_issued,
            self.produced,
            self.consumed,
            self.broken,
            self.stopped_early,
            self.elapsed
        )
    }
}

/// A configured widget pipeline, ready to run.
///
/// # Examples
///
/// ```rust
/// use widgetline::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let config = PipelineConfig::new()
///         .producers(4)
///         .consumers(2)
///         .total_widgets(100)
///         .bad_widget(42)
///         .capacity(16);
///
///     let summary = Pipeline::new(config).sink(NullSink).run().await?;
///     assert!(summary.is_complete());
///     assert_eq!(summary.broken, 1);
///     Ok(())
/// }
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    sink: Arc<dyn ReportSink>,
}

impl Pipeline {
    /// Create a pipeline that logs its reports
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            sink: Arc::new(LogSink),
        }
    }

    /// Set the report sink
    pub fn sink<S: ReportSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// The configuration this pipeline will run with
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run to completion.
    ///
    /// Returns only after every producer, consumer and the issuer have
    /// terminated. Worker failures are reported after shutdown has finished;
    /// an invalid configuration fails before anything is spawned.
    pub async fn run(self) -> Result<RunSummary> {
        let Pipeline { config, sink } = self;
        config.validate()?;

        let started = Instant::now();
        tracing::info!(
            producers = config.producers,
            consumers = config.consumers,
            total_widgets = config.total_widgets,
            bad_widget = config.bad_widget,
            capacity = config.capacity,
            stop_policy = ?config.stop_policy,
            "starting pipeline"
        );

        let (issuer, ids, stop) = IdIssuer::spawn(config.grant_limit(), config.producers);
        let (items_tx, items_rx) = async_channel::bounded(config.capacity);

        let producers: Vec<JoinHandle<Result<ProducerStats>>> = (1..=config.producers)
            .map(|index| {
                let producer = Producer::new(index, ids.clone(), items_tx.clone(), config.bad_widget);
                tokio::spawn(
                    producer
                        .run()
                        .instrument(tracing::debug_span!("producer", index)),
                )
            })
            .collect();

        let consumers: Vec<JoinHandle<Result<ConsumerStats>>> = (1..=config.consumers)
            .map(|index| {
                let consumer = Consumer::new(index, items_rx.clone(), stop.clone(), sink.clone());
                tokio::spawn(
                    consumer
                        .run()
                        .instrument(tracing::debug_span!("consumer", index)),
                )
            })
            .collect();

        // Only the workers may hold these. The issuer's final wait ends when
        // the last stop handle goes away, and producers must see the channel
        // close if every consumer dies.
        drop(ids);
        drop(stop);
        drop(items_rx);

        let mut failure: Option<Error> = None;
        let mut summary = RunSummary::default();

        for stats in join_all(producers).await {
            match flatten(stats) {
                Ok(stats) => summary.produced += stats.produced,
                Err(e) => record(&mut failure, e),
            }
        }

        items_tx.close();
        drop(items_tx);
        tracing::debug!(produced = summary.produced, "producers done, item channel closed");

        for stats in join_all(consumers).await {
            match flatten(stats) {
                Ok(stats) => {
                    summary.consumed += stats.consumed;
                    summary.broken += stats.broken;
                    summary.stop_requests += stats.stop_requests;
                }
                Err(e) => record(&mut failure, e),
            }
        }

        if let Err(e) = sink.finish().await {
            record(&mut failure, e);
        }

        let report = match issuer.await {
            Ok(report) => report,
            Err(e) => {
                record(&mut failure, e.into());
                IssuerReport::default()
            }
        };
        summary.ids_issued = report.issued;
        summary.stopped_early = report.stopped_early;
        summary.elapsed = started.elapsed();

        if let Some(e) = failure {
            tracing::warn!(error = %e, %summary, "pipeline finished with errors");
            return Err(e);
        }

        tracing::info!(%summary, "pipeline finished");
        Ok(summary)
    }
}

fn flatten<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined?
}

fn record(failure: &mut Option<Error>, e: Error) {
    tracing::error!(error = %e, "pipeline worker failed");
    failure.get_or_insert(e);
}

/// Run a pipeline to completion on the current runtime.
pub async fn run<S: ReportSink + 'static>(config: PipelineConfig, sink: S) -> Result<RunSummary> {
    Pipeline::new(config).sink(sink).run().await
}

/// Run a pipeline to completion on a dedicated multi-threaded runtime.
///
/// Must not be called from within an async context.
pub fn run_blocking<S: ReportSink + 'static>(
    config: PipelineConfig,
    sink: S,
) -> Result<RunSummary> {
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Runtime(e.to_string()))?;
    runtime.block_on(run(config, sink))
}
