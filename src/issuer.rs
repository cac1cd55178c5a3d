//! The single authority that hands out widget identifiers.
//!
//! The issuer runs as its own task and owns all of its counters. Producers
//! ask it for identifiers over a request channel and get the answer back on a
//! oneshot; consumers can ask it to stop through a [`StopHandle`]. Nothing
//! else ever touches the counters, so producers never contend on a shared
//! lock.
//!
//! The stop signal is a buffered single slot. The first [`StopHandle::stop`]
//! fills it; any later call finds the slot full or the issuer gone and is
//! dropped without blocking.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// The issuer's answer to a request for an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// A fresh identifier, strictly greater than every one granted before it
    Id(u64),
    /// Every permitted identifier has been handed out
    Exhausted,
    /// The issuer was stopped (or is gone) and grants nothing more
    Closed,
}

impl Grant {
    /// Convert into a `Result`, mapping the terminal answers onto their error
    /// variants.
    pub fn into_result(self) -> Result<u64> {
        match self {
            Grant::Id(id) => Ok(id),
            Grant::Exhausted => Err(Error::IssuerExhausted),
            Grant::Closed => Err(Error::IssuerClosed),
        }
    }
}

struct IdRequest {
    reply: oneshot::Sender<Grant>,
}

/// Producer-side handle used to request identifiers.
#[derive(Debug, Clone)]
pub struct IdClient {
    tx: mpsc::Sender<IdRequest>,
}

impl IdClient {
    /// Request the next identifier.
    ///
    /// Waits while the issuer's request queue is full. Resolves to
    /// [`Grant::Closed`] if the issuer has shut down, including when it shuts
    /// down while this request is still queued.
    pub async fn next_id(&self) -> Grant {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(IdRequest { reply }).await.is_err() {
            return Grant::Closed;
        }
        rx.await.unwrap_or(Grant::Closed)
    }
}

impl std::fmt::Debug for IdRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdRequest").finish_non_exhaustive()
    }
}

/// Consumer-side handle used to stop identifier issuance.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: mpsc::Sender<()>,
}

impl StopHandle {
    /// Ask the issuer to stop granting identifiers.
    ///
    /// Never blocks and is safe to call any number of times from any number
    /// of tasks. Returns `true` only for the call that actually filled the
    /// stop slot.
    pub fn stop(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }

    /// Whether the issuer has already shut down
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// What the issuer did over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IssuerReport {
    /// Number of identifiers granted; they are exactly `1..=issued`
    pub issued: u64,
    /// Whether a stop signal closed the issuer before its limit was reached
    pub stopped_early: bool,
}

/// The issuer task state.
#[derive(Debug)]
pub struct IdIssuer {
    next: u64,
    remaining: u64,
    requests: mpsc::Receiver<IdRequest>,
    stop: mpsc::Receiver<()>,
}

impl IdIssuer {
    /// Create an issuer permitted to grant `limit` identifiers.
    ///
    /// `queue` bounds the number of outstanding requests; one per producer is
    /// enough since each producer waits for its answer before asking again.
    pub fn new(limit: u64, queue: usize) -> (Self, IdClient, StopHandle) {
        let (request_tx, requests) = mpsc::channel(queue.max(1));
        let (stop_tx, stop) = mpsc::channel(1);

        let issuer = Self {
            next: 1,
            remaining: limit,
            requests,
            stop,
        };
        (
            issuer,
            IdClient { tx: request_tx },
            StopHandle { tx: stop_tx },
        )
    }

    /// Create an issuer and spawn it onto the current runtime.
    pub fn spawn(limit: u64, queue: usize) -> (JoinHandle<IssuerReport>, IdClient, StopHandle) {
        let (issuer, client, stop) = Self::new(limit, queue);
        (tokio::spawn(issuer.run()), client, stop)
    }

    /// Serve requests until stopped.
    ///
    /// While identifiers remain, the stop slot is checked before every grant.
    /// Once the limit is reached the issuer answers [`Grant::Exhausted`] and
    /// waits for a stop signal; that wait also ends when every
    /// [`StopHandle`] has been dropped, so the task always terminates.
    pub async fn run(mut self) -> IssuerReport {
        tracing::debug!(limit = self.remaining, "ID issuer started");

        let mut stop_open = true;

        while self.remaining > 0 {
            tokio::select! {
                biased;

                signal = self.stop.recv(), if stop_open => match signal {
                    Some(()) => {
                        tracing::info!(issued = self.issued(), "ID issuer received stop signal");
                        return self.close(true);
                    }
                    None => stop_open = false,
                },
                request = self.requests.recv() => match request {
                    Some(request) => self.grant(request),
                    None => {
                        tracing::debug!("every producer released the ID issuer");
                        return self.close(false);
                    }
                },
            }
        }

        tracing::debug!(issued = self.issued(), "ID issuer exhausted");

        let mut requests_open = true;
        loop {
            tokio::select! {
                biased;

                _ = self.stop.recv() => break,
                request = self.requests.recv(), if requests_open => match request {
                    Some(request) => {
                        let _ = request.reply.send(Grant::Exhausted);
                    }
                    None => requests_open = false,
                },
            }
        }

        self.close(false)
    }

    fn issued(&self) -> u64 {
        self.next - 1
    }

    fn grant(&mut self, request: IdRequest) {
        let id = self.next;
        // A requester that gave up does not consume an identifier.
        if request.reply.send(Grant::Id(id)).is_ok() {
            self.next += 1;
            self.remaining -= 1;
            tracing::trace!(id, "granted identifier");

            #[cfg(feature = "metrics")]
            metrics::counter!("widgetline_ids_issued_total").increment(1);
        }
    }

    fn close(mut self, stopped_early: bool) -> IssuerReport {
        self.stop.close();
        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            let _ = request.reply.send(Grant::Closed);
        }

        let report = IssuerReport {
            issued: self.issued(),
            stopped_early,
        };
        tracing::debug!(
            issued = report.issued,
            stopped_early = report.stopped_early,
            "ID issuer closed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn grants_sequential_ids_then_exhausts() {
        let (handle, client, stop) = IdIssuer::spawn(3, 1);

        assert_eq!(client.next_id().await, Grant::Id(1));
        assert_eq!(client.next_id().await, Grant::Id(2));
        assert_eq!(client.next_id().await, Grant::Id(3));
        assert_eq!(client.next_id().await, Grant::Exhausted);
        assert_eq!(client.next_id().await, Grant::Exhausted);

        // The final wait ends once nobody can send a stop any more.
        drop(stop);
        let report = timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(
            report,
            IssuerReport {
                issued: 3,
                stopped_early: false
            }
        );
        assert_eq!(client.next_id().await, Grant::Closed);
    }

    #[tokio::test]
    async fn zero_limit_is_exhausted_immediately() {
        let (handle, client, stop) = IdIssuer::spawn(0, 1);

        assert_eq!(client.next_id().await, Grant::Exhausted);
        assert!(stop.stop());

        let report = timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(report.issued, 0);
        assert!(!report.stopped_early);
    }

    #[tokio::test]
    async fn stop_closes_issuance() {
        let (handle, client, stop) = IdIssuer::spawn(100, 1);

        assert_eq!(client.next_id().await, Grant::Id(1));
        assert!(stop.stop());

        let report = timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(report.issued, 1);
        assert!(report.stopped_early);
        assert_eq!(client.next_id().await, Grant::Closed);
        assert!(stop.is_closed());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (handle, client, stop) = IdIssuer::spawn(10, 1);
        let other = stop.clone();

        let first = stop.stop();
        let second = other.stop();
        assert!(first);
        assert!(!second);

        let report = timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(report.stopped_early);

        // Late signals after the issuer is gone are absorbed as well.
        assert!(!stop.stop());
        assert!(!other.stop());
        assert_eq!(client.next_id().await, Grant::Closed);
    }

    #[tokio::test]
    async fn concurrent_stops_do_not_block() {
        let (handle, _client, stop) = IdIssuer::spawn(10, 1);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let stop = stop.clone();
                tokio::spawn(async move { stop.stop() })
            })
            .collect();

        let delivered = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|r| *r.as_ref().unwrap())
            .count();
        assert_eq!(delivered, 1);

        let report = timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(report.stopped_early);
        assert_eq!(report.issued, 0);
    }

    #[tokio::test]
    async fn concurrent_clients_get_unique_ids() {
        let (handle, client, stop) = IdIssuer::spawn(500, 8);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move {
                    let mut ids = Vec::new();
                    while let Grant::Id(id) = client.next_id().await {
                        ids.push(id);
                    }
                    ids
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for task in futures::future::join_all(tasks).await {
            let ids = task.unwrap();
            // Each client observes its own grants in increasing order.
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen, (1..=500).collect::<HashSet<_>>());

        drop(stop);
        let report = timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(report.issued, 500);
    }

    #[tokio::test]
    async fn issuer_exits_when_every_client_is_gone() {
        let (handle, client, _stop) = IdIssuer::spawn(10, 1);

        assert_eq!(client.next_id().await, Grant::Id(1));
        drop(client);

        let report = timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(report.issued, 1);
        assert!(!report.stopped_early);
    }

    #[test]
    fn grant_into_result() {
        assert_eq!(Grant::Id(4).into_result().unwrap(), 4);
        assert!(matches!(
            Grant::Exhausted.into_result(),
            Err(Error::IssuerExhausted)
        ));
        assert!(matches!(
            Grant::Closed.into_result(),
            Err(Error::IssuerClosed)
        ));
    }
}
