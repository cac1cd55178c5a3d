//! Widget consumers.

use std::sync::Arc;

use crate::error::Result;
use crate::issuer::StopHandle;
use crate::traits::ReportSink;
use crate::widget::{Report, Widget};

/// Counts reported by a consumer when it finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Widgets taken off the item channel
    pub consumed: u64,
    /// Broken widgets among them
    pub broken: u64,
    /// Stop signals this consumer sent to the issuer
    pub stop_requests: u64,
}

/// One member of the consumer pool.
pub struct Consumer {
    index: usize,
    items: async_channel::Receiver<Widget>,
    stop: StopHandle,
    sink: Arc<dyn ReportSink>,
}

impl Consumer {
    /// Create a consumer. `index` starts at 1.
    pub fn new(
        index: usize,
        items: async_channel::Receiver<Widget>,
        stop: StopHandle,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            index,
            items,
            stop,
            sink,
        }
    }

    /// Consume until the item channel is closed and drained.
    ///
    /// Stopping the issuer does not end this loop: widgets that are already
    /// buffered or in flight keep arriving and are reported normally.
    pub async fn run(self) -> Result<ConsumerStats> {
        tracing::debug!(consumer = self.index, "consumer started");

        let mut stats = ConsumerStats::default();
        while let Ok(widget) = self.items.recv().await {
            stats.consumed += 1;

            let report = if widget.is_broken() {
                stats.broken += 1;
                stats.stop_requests += 1;
                let delivered = self.stop.stop();
                tracing::info!(
                    consumer = self.index,
                    id = widget.id(),
                    delivered,
                    "broken widget detected, stopping production"
                );

                #[cfg(feature = "metrics")]
                metrics::counter!("widgetline_broken_widgets_total").increment(1);

                Report::Broken {
                    consumer: self.index,
                    widget,
                }
            } else {
                let elapsed = widget.age();

                #[cfg(feature = "metrics")]
                metrics::histogram!("widgetline_consume_latency_seconds")
                    .record(elapsed.as_secs_f64());

                Report::Normal {
                    consumer: self.index,
                    widget,
                    elapsed,
                }
            };

            #[cfg(feature = "metrics")]
            metrics::counter!("widgetline_widgets_consumed_total").increment(1);

            if let Err(e) = self.sink.report(report).await {
                tracing::warn!(consumer = self.index, error = %e, "report sink failed");
                return Err(e);
            }
        }

        tracing::debug!(
            consumer = self.index,
            consumed = stats.consumed,
            "consumer finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::issuer::IdIssuer;
    use crate::sinks::CollectSink;
    use crate::widget::ProducerId;
    use async_trait::async_trait;

    struct FailingSink;

    #[async_trait]
    impl ReportSink for FailingSink {
        async fn report(&self, _report: Report) -> Result<()> {
            Err(Error::sink(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "gone",
            )))
        }
    }

    #[tokio::test]
    async fn reports_every_widget_until_closed() {
        let (_issuer, _client, stop) = IdIssuer::new(0, 1);
        let (tx, rx) = async_channel::bounded(4);
        let sink = CollectSink::new();

        for id in 1..=3 {
            tx.send(Widget::new(id, ProducerId(1), -1)).await.unwrap();
        }
        drop(tx);

        let stats = Consumer::new(1, rx, stop, Arc::new(sink.clone()))
            .run()
            .await
            .unwrap();
        assert_eq!(stats.consumed, 3);
        assert_eq!(stats.broken, 0);
        assert_eq!(stats.stop_requests, 0);

        let reports = sink.reports().await;
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| !r.is_broken() && r.consumer() == 1));
    }

    #[tokio::test]
    async fn broken_widget_stops_issuer_and_keeps_draining() {
        let (handle, _client, stop) = IdIssuer::spawn(100, 1);
        let (tx, rx) = async_channel::bounded(4);
        let sink = CollectSink::new();

        tx.send(Widget::new(1, ProducerId(1), 2)).await.unwrap();
        tx.send(Widget::new(2, ProducerId(1), 2)).await.unwrap();
        tx.send(Widget::new(3, ProducerId(2), 2)).await.unwrap();
        drop(tx);

        let stats = Consumer::new(2, rx, stop, Arc::new(sink.clone()))
            .run()
            .await
            .unwrap();
        assert_eq!(stats.consumed, 3);
        assert_eq!(stats.broken, 1);
        assert_eq!(stats.stop_requests, 1);
        assert!(handle.await.unwrap().stopped_early);

        let reports = sink.reports().await;
        let broken: Vec<_> = reports.iter().filter(|r| r.is_broken()).collect();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].widget().id(), 2);
        assert_eq!(
            broken[0].to_string(),
            "Consumer_2 found a broken widget [id=2 source=Producer_1 broken=true] -- stopping production"
        );
    }

    #[tokio::test]
    async fn sink_failure_ends_the_consumer() {
        let (_issuer, _client, stop) = IdIssuer::new(0, 1);
        let (tx, rx) = async_channel::bounded(1);
        tx.send(Widget::new(1, ProducerId(1), -1)).await.unwrap();

        let err = Consumer::new(1, rx, stop, Arc::new(FailingSink))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
    }
}
