// ── Per-subscription snapshot streams ──
//
// Every fresh snapshot goes out on one broadcast channel; each stream
// keeps only the ids its subscription currently covers.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use super::schedule::IdFilter;
use crate::model::{EntityId, EntitySnapshot};

/// Fresh snapshots for one subscription.
///
/// Follows replacement of the subscription's id set and goes quiet once
/// the subscription is removed. Ends when the poller is dropped.
pub struct SnapshotStream {
    receiver: broadcast::Receiver<Arc<EntitySnapshot>>,
    filter: IdFilter,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Arc<EntitySnapshot>>, filter: IdFilter) -> Self {
        Self { receiver, filter }
    }

    /// Ids the subscription currently covers.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.filter.load().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Wait for the next snapshot of a covered id.
    ///
    /// A reader that falls behind skips what it missed and carries on.
    pub async fn next(&mut self) -> Option<Arc<EntitySnapshot>> {
        loop {
            match self.receiver.recv().await {
                Ok(snap) if self.filter.load().contains(&snap.entity_id) => return Some(snap),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "snapshot stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> SnapshotBroadcastStream {
        SnapshotBroadcastStream {
            inner: BroadcastStream::new(self.receiver),
            filter: self.filter,
        }
    }
}

impl std::fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("entity_ids", &self.entity_ids())
            .finish_non_exhaustive()
    }
}

/// `Stream` adapter over a [`SnapshotStream`].
pub struct SnapshotBroadcastStream {
    inner: BroadcastStream<Arc<EntitySnapshot>>,
    filter: IdFilter,
}

impl Stream for SnapshotBroadcastStream {
    type Item = Arc<EntitySnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(snap))) => {
                    if self.filter.load().contains(&snap.entity_id) {
                        return Poll::Ready(Some(snap));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "snapshot stream lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
