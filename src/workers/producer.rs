//! Widget producers.

use crate::error::{Error, Result};
use crate::issuer::{Grant, IdClient};
use crate::widget::{ProducerId, Widget};

/// Counts reported by a producer when it finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Widgets pushed into the item channel
    pub produced: u64,
}

/// One member of the producer pool.
///
/// A producer owns no shared mutable state. Uniqueness and exhaustion are the
/// issuer's business; the producer only turns each granted identifier into a
/// widget and hands it downstream.
#[derive(Debug)]
pub struct Producer {
    id: ProducerId,
    ids: IdClient,
    items: async_channel::Sender<Widget>,
    bad_widget: i64,
}

impl Producer {
    /// Create a producer. `index` starts at 1.
    pub fn new(
        index: usize,
        ids: IdClient,
        items: async_channel::Sender<Widget>,
        bad_widget: i64,
    ) -> Self {
        Self {
            id: ProducerId(index),
            ids,
            items,
            bad_widget,
        }
    }

    /// Build the widget for an issued identifier.
    pub fn build(&self, id: u64) -> Widget {
        Widget::new(id, self.id, self.bad_widget)
    }

    /// Produce until the issuer is exhausted or closed.
    ///
    /// Fails with [`Error::ItemChannelClosed`] if every consumer has gone away
    /// while a widget was still being delivered.
    pub async fn run(self) -> Result<ProducerStats> {
        tracing::debug!(producer = %self.id, "producer started");

        let mut stats = ProducerStats::default();
        loop {
            let id = match self.ids.next_id().await {
                Grant::Id(id) => id,
                grant => {
                    tracing::debug!(
                        producer = %self.id,
                        produced = stats.produced,
                        ?grant,
                        "producer finished"
                    );
                    return Ok(stats);
                }
            };

            let widget = self.build(id);
            tracing::trace!(producer = %self.id, id, broken = widget.is_broken(), "produced widget");

            if self.items.send(widget).await.is_err() {
                tracing::warn!(producer = %self.id, id, "no consumer left to take widget");
                return Err(Error::ItemChannelClosed { id });
            }
            stats.produced += 1;

            #[cfg(feature = "metrics")]
            metrics::counter!("widgetline_widgets_produced_total").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::IdIssuer;

    #[tokio::test]
    async fn builds_widgets_from_issued_ids() {
        let (_issuer, client, _stop) = IdIssuer::new(2, 1);
        let (tx, _rx) = async_channel::bounded(2);
        let producer = Producer::new(1, client, tx, 2);

        let first = producer.build(1);
        assert_eq!(first.id(), 1);
        assert_eq!(first.source(), ProducerId(1));
        assert!(!first.is_broken());

        let second = producer.build(2);
        assert!(second.is_broken());
    }

    #[tokio::test]
    async fn produces_until_exhausted() {
        let (handle, client, stop) = IdIssuer::spawn(2, 1);
        let (tx, rx) = async_channel::bounded(2);

        let stats = Producer::new(1, client, tx, 2).run().await.unwrap();
        assert_eq!(stats.produced, 2);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.id(), first.is_broken()), (1, false));
        assert_eq!((second.id(), second.is_broken()), (2, true));
        assert_eq!(second.to_string(), "[id=2 source=Producer_1 broken=true]");
        // The producer dropped its sender, so the channel is drained and closed.
        assert!(rx.recv().await.is_err());

        drop(stop);
        assert_eq!(handle.await.unwrap().issued, 2);
    }

    #[tokio::test]
    async fn stops_when_issuer_is_closed() {
        let (handle, client, stop) = IdIssuer::spawn(10, 1);
        assert!(stop.stop());
        handle.await.unwrap();

        let (tx, rx) = async_channel::bounded(1);
        let stats = Producer::new(1, client, tx, -1).run().await.unwrap();
        assert_eq!(stats.produced, 0);
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn fails_when_no_consumer_is_left() {
        let (_handle, client, _stop) = IdIssuer::spawn(10, 1);
        let (tx, rx) = async_channel::bounded(1);
        drop(rx);

        let err = Producer::new(1, client, tx, -1).run().await.unwrap_err();
        assert!(matches!(err, Error::ItemChannelClosed { id: 1 }));
    }
}
