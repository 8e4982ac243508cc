//! Upload engine contract.
//!
//! The resumable transfer protocol itself lives outside this crate. The list only consumes
//! four notification shapes per queue id, a per-listener subscription, and a `cancel`
//! command:
//!
//! - [`UploadEngine::subscribe`] registers a [`UploadListener`] and returns the owning
//!   [`Subscription`] handle; releasing the handle stops delivery.
//! - Engines broadcast every [`UploadEvent`] to every live listener. Listeners filter on
//!   [`UploadEvent::queue_id`].
//! - [`UploadEngine::cancel`] is fire-and-forget. Implementations must not deliver
//!   notifications from inside `cancel` (callers hold list locks while calling it).
//!
//! [`local::LocalEngine`] is an in-process implementation used by the binary and the tests.

pub mod local;

use crate::error::EngineError;
use crate::models::UploadItem;
use std::fmt;
use std::sync::Arc;

pub use local::{LocalEngine, TransferOutcome, TransferPlan, simulate_transfer};

/// Notification delivered by the upload engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadEvent {
    Started {
        queue_id: String,
        offset: u64,
        total: u64,
    },
    Progress {
        queue_id: String,
        offset: u64,
        total: u64,
    },
    Succeeded {
        queue_id: String,
        id: Option<String>,
        offset: u64,
        /// Complete server record replacing the queued item, when the engine has one
        final_item: Option<UploadItem>,
        /// Whether the file should join the confirmed list
        should_list: bool,
    },
    Failed {
        queue_id: String,
        reason: String,
    },
}

impl UploadEvent {
    pub fn queue_id(&self) -> &str {
        match self {
            UploadEvent::Started { queue_id, .. }
            | UploadEvent::Progress { queue_id, .. }
            | UploadEvent::Succeeded { queue_id, .. }
            | UploadEvent::Failed { queue_id, .. } => queue_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadEvent::Succeeded { .. } | UploadEvent::Failed { .. }
        )
    }
}

/// Receives engine notifications. Called from engine threads.
pub trait UploadListener: Send + Sync {
    fn on_event(&self, event: &UploadEvent);
}

/// The upload engine as seen by the list.
#[cfg_attr(test, mockall::automock)]
pub trait UploadEngine: Send + Sync {
    /// Register `listener` for notifications concerning `queue_id`.
    fn subscribe(&self, queue_id: &str, listener: Arc<dyn UploadListener>) -> Subscription;

    /// Ask the engine to cancel or dequeue `queue_id`. Acknowledged asynchronously.
    fn cancel(&self, queue_id: &str) -> Result<(), EngineError>;
}

/// Live registration of one listener with an engine.
///
/// Released exactly once: either explicitly through [`Subscription::release`] or when dropped.
pub struct Subscription {
    queue_id: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(queue_id: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            queue_id: queue_id.into(),
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn detached(queue_id: impl Into<String>) -> Self {
        Self {
            queue_id: queue_id.into(),
            release: None,
        }
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    pub fn release(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!("Releasing subscription for {}", self.queue_id);
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("queue_id", &self.queue_id)
            .field("live", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_release_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = Subscription::new("q-1", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscription.release();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        {
            let _subscription = Subscription::new("q-1", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_queue_id() {
        let event = UploadEvent::Failed {
            queue_id: "q-9".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(event.queue_id(), "q-9");
        assert!(event.is_terminal());

        let progress = UploadEvent::Progress {
            queue_id: "q-9".to_string(),
            offset: 1,
            total: 2,
        };
        assert!(!progress.is_terminal());
    }
}
