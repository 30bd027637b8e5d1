//! Live subscriptions as cancellable snapshot streams.
//!
//! A [`Subscription`] is the pull side of a live query: a `Stream` of
//! [`SnapshotEvent`]s plus a cancellation token. The store keeps the push
//! side ([`SnapshotSink`]) and stops delivering once the token is cancelled
//! or the subscription is dropped.
//!
//! Within one subscription, events arrive in the order the store observed
//! them. Nothing orders events across different subscriptions.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::StreamExt;
use futures::channel::mpsc;
use tokio_util::sync::CancellationToken;

use crate::document::Document;
use crate::error::StoreError;

/// One delivery on a live subscription.
#[derive(Clone, Debug)]
pub enum SnapshotEvent {
    /// The complete current result set. For a document subscription this
    /// holds zero (absent) or one document.
    Snapshot(Vec<Document>),
    /// A listener error. The subscription stays open; the store may recover.
    Error(StoreError),
}

/// Consumer side of a live query.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SnapshotEvent>,
    token: CancellationToken,
}

/// Producer side of a live query, held by the store.
#[derive(Clone)]
pub struct SnapshotSink {
    tx: mpsc::UnboundedSender<SnapshotEvent>,
    token: CancellationToken,
}

impl Subscription {
    /// Create a connected sink/subscription pair.
    pub fn channel() -> (SnapshotSink, Subscription) {
        let (tx, events) = mpsc::unbounded();
        let token = CancellationToken::new();
        (
            SnapshotSink { tx, token: token.clone() },
            Subscription { events, token },
        )
    }

    /// Token that cancels this subscription; cheap to clone and hand out.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop delivery. Events already queued are discarded.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl Stream for Subscription {
    type Item = SnapshotEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.events.poll_next_unpin(cx)
    }
}

impl SnapshotSink {
    /// Deliver an event. Returns false once the subscription is gone.
    pub fn send(&self, event: SnapshotEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.unbounded_send(event).is_ok()
    }

    /// Cancelled by the consumer, or the receiving half was dropped.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (sink, mut sub) = Subscription::channel();
        assert!(sink.send(SnapshotEvent::Snapshot(Vec::new())));
        assert!(sink.send(SnapshotEvent::Error(StoreError::Unavailable("x".into()))));

        assert!(matches!(sub.next().await, Some(SnapshotEvent::Snapshot(_))));
        assert!(matches!(sub.next().await, Some(SnapshotEvent::Error(_))));
    }

    #[tokio::test]
    async fn test_cancel_ends_stream_and_closes_sink() {
        let (sink, mut sub) = Subscription::channel();
        sink.send(SnapshotEvent::Snapshot(Vec::new()));
        sub.cancel();

        assert!(sub.next().await.is_none());
        assert!(sink.is_closed());
        assert!(!sink.send(SnapshotEvent::Snapshot(Vec::new())));
    }

    #[test]
    fn test_drop_closes_sink() {
        let (sink, sub) = Subscription::channel();
        drop(sub);
        assert!(sink.is_closed());
    }
}
