use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use jobfilter_core_types::FilterError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    /// Delivers `event` to current subscribers. Fails with
    /// [`FilterError::MessageDelivery`] when nobody is listening.
    async fn publish(&self, event: E) -> Result<(), FilterError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory bus backed by a tokio broadcast channel.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), FilterError> {
        self.sender.send(event).map(|_| ()).map_err(|err| {
            trace!(target: "jobfilter.bus", "publish without listeners");
            FilterError::MessageDelivery(err.to_string())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Publishes and drops the error. Used for best-effort relays where a
/// missing listener is the normal case (no control panel open).
pub async fn publish_best_effort<E, B>(bus: &B, event: E)
where
    E: Event,
    B: EventBus<E> + ?Sized,
{
    let _ = bus.publish(event).await;
}
