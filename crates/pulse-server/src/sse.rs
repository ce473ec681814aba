use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::response::sse::{Event as SseEvent, Sse};
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use pin_project_lite::pin_project;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::relay::Relay;
use crate::streams::ClientId;

/// Which pool a stream belongs to; drives detach on drop.
pub(crate) enum Pool {
    Dashboard,
    Device,
}

/// Detaches a connection handle from its pool when the SSE body is
/// dropped. The transport close signal is the only disconnect detection:
/// no idle timeout, no keep-alive probing.
pub(crate) struct DisconnectGuard {
    relay: Arc<Relay>,
    client: ClientId,
    pool: Pool,
}

impl DisconnectGuard {
    pub(crate) fn new(relay: Arc<Relay>, client: ClientId, pool: Pool) -> Self {
        Self { relay, client, pool }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        match self.pool {
            Pool::Dashboard => self.relay.detach_dashboard(&self.client),
            Pool::Device => self.relay.detach_device(&self.client),
        }
    }
}

pin_project! {
    /// A frame stream that carries its pool membership with it, so the
    /// handle is evicted exactly when the response body goes away.
    pub(crate) struct PoolStream<S> {
        #[pin]
        inner: S,
        guard: DisconnectGuard,
    }
}

impl<S: Stream> Stream for PoolStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
        self.project().inner.poll_next(cx)
    }
}

/// Build the SSE response for a freshly joined client: the greeting frame
/// first, then everything broadcast into its queue until disconnect.
pub(crate) fn stream_response<M>(
    relay: Arc<Relay>,
    client: ClientId,
    pool: Pool,
    greeting: M,
    rx: mpsc::Receiver<M>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>>
where
    M: Serialize + Send + 'static,
{
    let guard = DisconnectGuard::new(relay, client, pool);
    let frames = stream::once(future::ready(greeting))
        .chain(ReceiverStream::new(rx))
        .filter_map(|message| future::ready(frame(&message)))
        .map(Ok::<SseEvent, Infallible>);

    Sse::new(PoolStream { inner: frames, guard })
}

/// One `data:`-framed JSON document, or nothing if serialization fails.
fn frame<M: Serialize>(message: &M) -> Option<SseEvent> {
    match serde_json::to_string(message) {
        Ok(json) => Some(SseEvent::default().data(json)),
        Err(error) => {
            tracing::warn!(%error, "Failed to serialize stream frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::events::KIND_DEVICE_DISCONNECTED;

    #[test]
    fn frame_wraps_json() {
        let event = frame(&serde_json::json!({"command": "CONNECTED"}));
        assert!(event.is_some());
    }

    #[test]
    fn guard_drop_detaches_dashboard() {
        let relay = Arc::new(Relay::new(100, 10, 32));
        let (client, _rx) = relay.attach_dashboard();
        assert_eq!(relay.dashboard_count(), 1);

        drop(DisconnectGuard::new(Arc::clone(&relay), client, Pool::Dashboard));
        assert_eq!(relay.dashboard_count(), 0);
    }

    #[test]
    fn guard_drop_detaches_device_and_announces() {
        let relay = Arc::new(Relay::new(100, 10, 32));
        let (client, _rx) = relay.attach_device();
        assert_eq!(relay.device_count(), 1);

        drop(DisconnectGuard::new(Arc::clone(&relay), client, Pool::Device));
        assert_eq!(relay.device_count(), 0);
        let latest = relay.log_store().latest().unwrap();
        assert_eq!(latest.kind, KIND_DEVICE_DISCONNECTED);
    }

    #[tokio::test]
    async fn pool_stream_passes_items_through() {
        let relay = Arc::new(Relay::new(100, 10, 32));
        let (client, _rx) = relay.attach_dashboard();
        let guard = DisconnectGuard::new(Arc::clone(&relay), client, Pool::Dashboard);

        let inner = stream::iter(vec![1u32, 2, 3]);
        let stream = PoolStream { inner, guard };
        let items: Vec<u32> = stream.collect().await;
        assert_eq!(items, vec![1, 2, 3]);

        // Stream consumed and dropped: the handle is gone from the pool.
        assert_eq!(relay.dashboard_count(), 0);
    }
}
