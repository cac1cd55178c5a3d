//! Report sink implementations.
//!
//! Every consumer in the pool shares one sink, so each of these is safe to
//! call concurrently. Line-oriented sinks use the [`Report`] `Display` form:
//!
//! ```text
//! Consumer_1 consumed [id=1 source=Producer_1 broken=false] in 41.2µs time
//! Consumer_2 found a broken widget [id=5 source=Producer_3 broken=true] -- stopping production
//! ```

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{Error, Result};
use crate::traits::ReportSink;
use crate::widget::Report;

/// A sink that turns reports into `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportSink for LogSink {
    async fn report(&self, report: Report) -> Result<()> {
        match &report {
            Report::Normal {
                consumer,
                widget,
                elapsed,
            } => tracing::info!(
                consumer,
                id = widget.id(),
                source = %widget.source(),
                ?elapsed,
                "consumed widget"
            ),
            Report::Broken { consumer, widget } => tracing::warn!(
                consumer,
                id = widget.id(),
                source = %widget.source(),
                "found a broken widget -- stopping production"
            ),
        }
        Ok(())
    }
}

/// A sink that prints reports to stdout.
#[derive(Debug, Default, Clone)]
pub struct PrintSink {
    /// The prefix to print before each report
    prefix: Option<String>,
}

impl PrintSink {
    /// Create a new print sink
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Create a new print sink with a prefix
    pub fn with_prefix(prefix: String) -> Self {
        Self {
            prefix: Some(prefix),
        }
    }

    fn line(&self, report: &Report) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}: {}", prefix, report),
            None => report.to_string(),
        }
    }
}

#[async_trait]
impl ReportSink for PrintSink {
    async fn report(&self, report: Report) -> Result<()> {
        println!("{}", self.line(&report));
        Ok(())
    }
}

/// A sink that keeps every report it receives.
#[derive(Debug, Default)]
pub struct CollectSink {
    reports: Arc<TokioMutex<Vec<Report>>>,
}

impl CollectSink {
    /// Create a new collect sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected reports, in arrival order
    pub async fn reports(&self) -> Vec<Report> {
        self.reports.lock().await.clone()
    }
}

impl Clone for CollectSink {
    fn clone(&self) -> Self {
        Self {
            reports: self.reports.clone(),
        }
    }
}

#[async_trait]
impl ReportSink for CollectSink {
    async fn report(&self, report: Report) -> Result<()> {
        self.reports.lock().await.push(report);
        Ok(())
    }
}

/// A sink that only counts reports.
#[derive(Debug, Default, Clone)]
pub struct CountSink {
    normal: Arc<AtomicU64>,
    broken: Arc<AtomicU64>,
}

impl CountSink {
    /// Create a new count sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Normal reports seen so far
    pub fn normal(&self) -> u64 {
        self.normal.load(Ordering::Relaxed)
    }

    /// Broken reports seen so far
    pub fn broken(&self) -> u64 {
        self.broken.load(Ordering::Relaxed)
    }

    /// All reports seen so far
    pub fn total(&self) -> u64 {
        self.normal() + self.broken()
    }
}

#[async_trait]
impl ReportSink for CountSink {
    async fn report(&self, report: Report) -> Result<()> {
        let counter = if report.is_broken() {
            &self.broken
        } else {
            &self.normal
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A sink that forwards reports into a channel.
///
/// The receiving half is exposed as a [`ReceiverStream`]; it ends once the
/// pipeline has finished and the sink has been dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Report>,
}

impl ChannelSink {
    /// Create a channel sink buffering up to `buffer` reports
    pub fn new(buffer: usize) -> (Self, ReceiverStream<Report>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, ReceiverStream::new(rx))
    }
}

#[async_trait]
impl ReportSink for ChannelSink {
    async fn report(&self, report: Report) -> Result<()> {
        self.tx.send(report).await.map_err(|e| {
            Error::sink(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("report stream dropped: {}", e),
            ))
        })
    }
}

/// A sink that writes report lines to a file.
pub struct FileSink {
    writer: TokioMutex<tokio::io::BufWriter<tokio::fs::File>>,
}

impl FileSink {
    /// Create a new file sink, truncating the file
    pub async fn new<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Self::from_file(file))
    }

    /// Create a file sink that appends to an existing file
    pub async fn append<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: tokio::fs::File) -> Self {
        Self {
            writer: TokioMutex::new(tokio::io::BufWriter::new(file)),
        }
    }
}

#[async_trait]
impl ReportSink for FileSink {
    async fn report(&self, report: Report) -> Result<()> {
        let line = format!("{}\n", report);
        self.writer.lock().await.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl ReportSink for NullSink {
    async fn report(&self, _report: Report) -> Result<()> {
        Ok(())
    }
}
