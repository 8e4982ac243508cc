// LocalEngine - In-process upload engine
//
// Broadcasts notifications to every live listener the way a browser-side upload component
// does, and simulates resumable transfers with tokio timers. Each transfer holds a name lock
// on its queue id so the same queue id never runs twice concurrently.

use super::{Subscription, UploadEngine, UploadEvent, UploadListener};
use crate::error::EngineError;
use crate::lock::{NameGuard, NameLock};
use crate::models::UploadItem;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type Registry = Mutex<IndexMap<u64, Arc<dyn UploadListener>>>;

/// In-process [`UploadEngine`].
pub struct LocalEngine {
    /// Live listeners in subscription order
    listeners: Arc<Registry>,
    next_subscription: AtomicU64,

    /// Queue ids handed out by [`LocalEngine::queue_file`]
    issued: Mutex<HashSet<String>>,
    cancelled: Mutex<HashSet<String>>,

    transfers: Arc<NameLock>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(IndexMap::new())),
            next_subscription: AtomicU64::new(1),
            issued: Mutex::new(HashSet::new()),
            cancelled: Mutex::new(HashSet::new()),
            transfers: Arc::new(NameLock::new()),
        }
    }

    /// Accept a file into the engine queue and return it with a fresh queue id.
    pub fn queue_file(
        &self,
        filename: impl Into<String>,
        mime_type: Option<String>,
        total_length: u64,
    ) -> UploadItem {
        let queue_id = uuid::Uuid::new_v4().to_string();
        self.issued.lock().insert(queue_id.clone());

        let item = UploadItem::queued(queue_id, filename, mime_type, total_length);
        tracing::debug!(
            "Queued {} as {:?} ({} bytes)",
            item.filename,
            item.queue_id,
            total_length
        );
        item
    }

    /// Deliver `event` to every live listener. Returns how many listeners received it.
    ///
    /// The registry lock is only held while taking a snapshot, never during delivery.
    pub fn dispatch(&self, event: &UploadEvent) -> usize {
        let listeners: Vec<Arc<dyn UploadListener>> =
            self.listeners.lock().values().cloned().collect();

        for listener in &listeners {
            listener.on_event(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_cancelled(&self, queue_id: &str) -> bool {
        self.cancelled.lock().contains(queue_id)
    }

    /// Claim the transfer slot for `queue_id`.
    pub fn begin_transfer(&self, queue_id: &str) -> Result<NameGuard, EngineError> {
        if self.is_cancelled(queue_id) {
            return Err(EngineError::Cancelled(queue_id.to_string()));
        }
        self.transfers
            .guard(queue_id)
            .ok_or_else(|| EngineError::Locked(queue_id.to_string()))
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadEngine for LocalEngine {
    fn subscribe(&self, queue_id: &str, listener: Arc<dyn UploadListener>) -> Subscription {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, listener);

        let registry = Arc::downgrade(&self.listeners);
        Subscription::new(queue_id, move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().shift_remove(&id);
            }
        })
    }

    fn cancel(&self, queue_id: &str) -> Result<(), EngineError> {
        if !self.issued.lock().contains(queue_id) {
            return Err(EngineError::UnknownQueueId(queue_id.to_string()));
        }
        self.cancelled.lock().insert(queue_id.to_string());
        tracing::info!("Cancellation requested for {}", queue_id);
        Ok(())
    }
}

/// How [`simulate_transfer`] should behave.
#[derive(Clone, Debug)]
pub struct TransferPlan {
    pub chunk_size: u64,
    pub chunk_delay: Duration,
    /// Fail after the last chunk with this reason instead of succeeding
    pub fail_with: Option<String>,
    pub should_list: bool,
}

impl Default for TransferPlan {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            chunk_delay: Duration::from_millis(5),
            fail_with: None,
            should_list: true,
        }
    }
}

/// Final result of a simulated transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    Succeeded(String),
    Failed(String),
}

/// Drive one queued item through Started, Progress and a terminal notification.
///
/// Stops with [`EngineError::Cancelled`] as soon as a cancellation request is seen.
pub async fn simulate_transfer(
    engine: Arc<LocalEngine>,
    item: UploadItem,
    plan: TransferPlan,
) -> Result<TransferOutcome, EngineError> {
    let queue_id = item
        .queue_id
        .clone()
        .ok_or_else(|| EngineError::UnknownQueueId(item.filename.clone()))?;
    let _guard = engine.begin_transfer(&queue_id)?;

    let total = item.total_length;
    let chunk = plan.chunk_size.max(1);
    engine.dispatch(&UploadEvent::Started {
        queue_id: queue_id.clone(),
        offset: 0,
        total,
    });

    let mut offset = 0;
    while offset < total {
        tokio::time::sleep(plan.chunk_delay).await;
        if engine.is_cancelled(&queue_id) {
            tracing::info!("Transfer {} stopped at {}/{}", queue_id, offset, total);
            return Err(EngineError::Cancelled(queue_id));
        }

        offset = (offset + chunk).min(total);
        engine.dispatch(&UploadEvent::Progress {
            queue_id: queue_id.clone(),
            offset,
            total,
        });
    }

    if let Some(reason) = plan.fail_with {
        engine.dispatch(&UploadEvent::Failed {
            queue_id,
            reason: reason.clone(),
        });
        return Ok(TransferOutcome::Failed(reason));
    }

    let id = uuid::Uuid::new_v4().to_string();
    engine.dispatch(&UploadEvent::Succeeded {
        queue_id,
        id: Some(id.clone()),
        offset,
        final_item: None,
        should_list: plan.should_list,
    });
    Ok(TransferOutcome::Succeeded(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<UploadEvent>>,
    }

    impl UploadListener for Recorder {
        fn on_event(&self, event: &UploadEvent) {
            self.events.lock().push(event.clone());
        }
    }

    #[test]
    fn test_broadcast_reaches_all_listeners() {
        let engine = LocalEngine::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let _sa = engine.subscribe("q-a", a.clone());
        let _sb = engine.subscribe("q-b", b.clone());

        let delivered = engine.dispatch(&UploadEvent::Progress {
            queue_id: "q-a".to_string(),
            offset: 1,
            total: 2,
        });

        assert_eq!(delivered, 2);
        assert_eq!(a.events.lock().len(), 1);
        assert_eq!(b.events.lock().len(), 1);
    }

    #[test]
    fn test_released_subscription_stops_delivery() {
        let engine = LocalEngine::new();
        let recorder = Arc::new(Recorder::default());
        let subscription = engine.subscribe("q-a", recorder.clone());
        assert_eq!(engine.listener_count(), 1);

        subscription.release();
        assert_eq!(engine.listener_count(), 0);

        engine.dispatch(&UploadEvent::Failed {
            queue_id: "q-a".to_string(),
            reason: "late".to_string(),
        });
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn test_cancel_unknown_queue_id() {
        let engine = LocalEngine::new();
        assert_eq!(
            engine.cancel("nope"),
            Err(EngineError::UnknownQueueId("nope".to_string()))
        );
    }

    #[test]
    fn test_cancel_blocks_new_transfer() {
        let engine = LocalEngine::new();
        let item = engine.queue_file("a.bin", None, 10);
        let queue_id = item.queue_id.unwrap();

        engine.cancel(&queue_id).unwrap();
        assert!(engine.is_cancelled(&queue_id));
        assert!(matches!(
            engine.begin_transfer(&queue_id),
            Err(EngineError::Cancelled(_))
        ));
    }

    #[test]
    fn test_transfer_slot_is_exclusive() {
        let engine = LocalEngine::new();
        let item = engine.queue_file("a.bin", None, 10);
        let queue_id = item.queue_id.unwrap();

        let guard = engine.begin_transfer(&queue_id).unwrap();
        assert!(matches!(
            engine.begin_transfer(&queue_id),
            Err(EngineError::Locked(_))
        ));
        drop(guard);
        assert!(engine.begin_transfer(&queue_id).is_ok());
    }

    #[tokio::test]
    async fn test_simulated_transfer_event_order() {
        let engine = Arc::new(LocalEngine::new());
        let recorder = Arc::new(Recorder::default());
        let _subscription = engine.subscribe("any", recorder.clone());

        let item = engine.queue_file("a.bin", None, 10);
        let plan = TransferPlan {
            chunk_size: 4,
            chunk_delay: Duration::from_millis(1),
            ..TransferPlan::default()
        };
        let outcome = simulate_transfer(engine.clone(), item, plan).await.unwrap();

        let events = recorder.events.lock();
        assert!(matches!(events[0], UploadEvent::Started { offset: 0, total: 10, .. }));
        let offsets: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                UploadEvent::Progress { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![4, 8, 10]);
        assert!(matches!(events.last(), Some(UploadEvent::Succeeded { .. })));
        assert!(matches!(outcome, TransferOutcome::Succeeded(_)));
    }

    #[tokio::test]
    async fn test_simulated_transfer_failure() {
        let engine = Arc::new(LocalEngine::new());
        let item = engine.queue_file("a.bin", None, 3);
        let plan = TransferPlan {
            chunk_delay: Duration::from_millis(1),
            fail_with: Some("server rejected".to_string()),
            ..TransferPlan::default()
        };

        let outcome = simulate_transfer(engine, item, plan).await.unwrap();
        assert_eq!(outcome, TransferOutcome::Failed("server rejected".to_string()));
    }
}
