//! Core traits for the widget pipeline.
//!
//! The pipeline itself only decides *what* happened to each widget. Where the
//! resulting reports end up is the business of a [`ReportSink`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::widget::Report;

/// A sink receives one report per consumed widget.
///
/// Every consumer in the pool shares the same sink, so implementations take
/// `&self` and must be safe to call concurrently.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use widgetline::error::Result;
/// use widgetline::traits::ReportSink;
/// use widgetline::widget::Report;
///
/// struct StderrSink;
///
/// #[async_trait]
/// impl ReportSink for StderrSink {
///     async fn report(&self, report: Report) -> Result<()> {
///         eprintln!("{}", report);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Accept a single report.
    ///
    /// Returning an error terminates the consumer that produced the report.
    async fn report(&self, report: Report) -> Result<()>;

    /// Called once after every consumer has finished.
    ///
    /// This allows sinks to flush any buffered state.
    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<S: ReportSink + ?Sized> ReportSink for Arc<S> {
    async fn report(&self, report: Report) -> Result<()> {
        (**self).report(report).await
    }

    async fn finish(&self) -> Result<()> {
        (**self).finish().await
    }
}

#[async_trait]
impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    async fn report(&self, report: Report) -> Result<()> {
        (**self).report(report).await
    }

    async fn finish(&self) -> Result<()> {
        (**self).finish().await
    }
}
