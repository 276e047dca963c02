use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};

use crate::types::MessageRecord;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type FeedWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// One push from the live subscription, already mapped into domain records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Full result set for the query, delivered on connect and whenever the
    /// server re-syncs the window.
    Snapshot(Vec<MessageRecord>),
    /// A single document entered (or re-entered) the query window.
    Upserted(MessageRecord),
    /// The subscription is gone and will deliver nothing further.
    Lost(String),
}

/// Consumer half of a live subscription.
///
/// Dropping the stream signals cancellation to the worker, so unsubscribing
/// on view teardown needs no explicit call.
pub struct FeedEventStream {
    events: mpsc::UnboundedReceiver<FeedEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

/// A started subscription: the worker future drives backend IO and must be
/// spawned on the tokio runtime; the stream yields mapped events.
pub struct FeedHandle {
    pub stream: FeedEventStream,
    pub worker: FeedWorker,
}

impl std::fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHandle").finish_non_exhaustive()
    }
}

impl FeedEventStream {
    pub(crate) fn new(
        events: mpsc::UnboundedReceiver<FeedEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<FeedEvent> {
        self.events.try_recv().ok()
    }

    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|cancel_tx| cancel_tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for FeedEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

pub(crate) fn make_feed_stream() -> (
    mpsc::UnboundedSender<FeedEvent>,
    FeedEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (event_tx, FeedEventStream::new(event_rx, cancel_tx), cancel_rx)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::types::{MessageId, UserId};

    fn record(id: &str, text: &str) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(id),
            text: text.to_string(),
            author_uid: UserId::new("uid-1"),
            author_photo_url: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn events_arrive_in_send_order() {
        let (event_tx, mut stream, _cancel_rx) = make_feed_stream();

        event_tx
            .send(FeedEvent::Snapshot(vec![record("m1", "first")]))
            .unwrap();
        event_tx
            .send(FeedEvent::Upserted(record("m2", "second")))
            .unwrap();

        assert_eq!(
            stream.recv().await,
            Some(FeedEvent::Snapshot(vec![record("m1", "first")]))
        );
        assert_eq!(
            stream.recv().await,
            Some(FeedEvent::Upserted(record("m2", "second")))
        );
    }

    #[tokio::test]
    async fn dropping_the_stream_resolves_the_cancel_signal() {
        let (_event_tx, stream, mut cancel_rx) = make_feed_stream();

        assert!(cancel_rx.try_recv().is_err());
        drop(stream);
        assert!(cancel_rx.await.is_ok());
    }

    #[tokio::test]
    async fn explicit_cancel_fires_once() {
        let (_event_tx, mut stream, mut cancel_rx) = make_feed_stream();

        assert!(stream.cancel());
        assert!(!stream.cancel());
        assert!(cancel_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn stream_drains_events_sent_before_worker_exit() {
        let (event_tx, mut stream, _cancel_rx) = make_feed_stream();

        event_tx
            .send(FeedEvent::Lost("connection reset".to_string()))
            .unwrap();
        drop(event_tx);

        assert_eq!(
            stream.recv().await,
            Some(FeedEvent::Lost("connection reset".to_string()))
        );
        assert_eq!(stream.recv().await, None);
    }
}
