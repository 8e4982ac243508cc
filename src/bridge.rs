// Upload notification bridge
//
// Connects one list item to the upload engine's notification stream. The engine broadcasts
// every notification to every listener, so each bridge filters on its own queue id.
//
// Locking: the per-item lock in `TrackedItem` guards the item's fields and its subscription.
// A bridge takes it for every notification and, only on terminal notifications, takes the
// list lock inside it. The list lock is never held while waiting for an item lock.

use crate::engine::{Subscription, UploadEvent, UploadListener};
use crate::error::ListError;
use crate::models::{ItemKey, UploadItem};
use crate::state::{ListChange, Shared};
use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, Weak};

/// Registration state of an item with the upload engine.
#[derive(Debug)]
pub(crate) enum Binding {
    /// Never subscribed (files that were already uploaded)
    Unbound,
    Live(Subscription),
    /// Subscription torn down; further notifications are stale
    Released,
}

/// Mutable state of one item, guarded by the per-item lock.
#[derive(Debug)]
pub(crate) struct ItemSlot {
    pub item: UploadItem,
    pub binding: Binding,
    /// Whether the item currently has an entry in the list
    pub listed: bool,
}

impl ItemSlot {
    pub fn is_live(&self) -> bool {
        matches!(self.binding, Binding::Live(_))
    }

    /// Release the subscription if it is live. Returns true when this call released it.
    pub fn unbind(&mut self) -> bool {
        match std::mem::replace(&mut self.binding, Binding::Released) {
            Binding::Live(subscription) => {
                subscription.release();
                true
            }
            Binding::Unbound => {
                self.binding = Binding::Unbound;
                false
            }
            Binding::Released => false,
        }
    }
}

/// An item together with its per-item lock.
///
/// Handed out by [`crate::state::UploadListManager`]; read it with [`TrackedItem::snapshot`].
#[derive(Debug)]
pub struct TrackedItem {
    key: ItemKey,
    queue_id: Option<String>,
    slot: Mutex<ItemSlot>,
}

impl TrackedItem {
    pub(crate) fn new(key: ItemKey, item: UploadItem) -> Self {
        Self {
            key,
            queue_id: item.queue_id.clone(),
            slot: Mutex::new(ItemSlot {
                item,
                binding: Binding::Unbound,
                listed: false,
            }),
        }
    }

    pub fn key(&self) -> ItemKey {
        self.key
    }

    /// Queue id the item was enqueued under; never changes.
    pub fn queue_id(&self) -> Option<&str> {
        self.queue_id.as_deref()
    }

    /// Copy of the item's current fields.
    pub fn snapshot(&self) -> UploadItem {
        self.slot.lock().item.clone()
    }

    pub fn is_listed(&self) -> bool {
        self.slot.lock().listed
    }

    /// Whether notifications for this item are still being delivered.
    pub fn is_subscribed(&self) -> bool {
        self.slot.lock().is_live()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ItemSlot> {
        self.slot.lock()
    }
}

/// Per-item listener registered with the upload engine.
pub struct NotificationBridge {
    item: Arc<TrackedItem>,
    shared: Weak<Shared>,
}

impl NotificationBridge {
    pub(crate) fn new(item: Arc<TrackedItem>, shared: Weak<Shared>) -> Self {
        Self { item, shared }
    }

    pub fn item(&self) -> &Arc<TrackedItem> {
        &self.item
    }

    /// Whether `event` concerns this bridge's item.
    pub fn owns(&self, event: &UploadEvent) -> bool {
        self.item.queue_id() == Some(event.queue_id())
    }

    /// Stop reacting to notifications. Safe to call any number of times.
    ///
    /// Once this returns, no notification mutates the item any more.
    pub fn unregister(&self) -> bool {
        self.item.lock().unbind()
    }

    fn apply(&self, event: &UploadEvent) -> Result<(), ListError> {
        // Declared first so it drops after the item lock: dropping the last strong reference
        // tears the list down, which locks every item.
        let shared = self.shared.upgrade();
        let mut slot = self.item.lock();
        if !slot.is_live() {
            return Err(ListError::StaleSubscription(event.queue_id().to_string()));
        }

        match event {
            UploadEvent::Started { offset, total, .. } => {
                slot.item.started = true;
                self.record_progress(&mut slot, *offset, *total, shared.as_deref());
            }
            UploadEvent::Progress { offset, total, .. } => {
                self.record_progress(&mut slot, *offset, *total, shared.as_deref());
            }
            UploadEvent::Succeeded {
                id,
                offset,
                final_item,
                should_list,
                ..
            } => {
                self.adopt_result(&mut slot.item, id.as_deref(), *offset, final_item.as_ref());
                if slot.item.id.is_none() {
                    slot.item.error = Some("Upload finished without a file id".to_string());
                    self.finish_failed(&mut slot, shared.as_deref());
                } else {
                    self.finish_succeeded(&mut slot, *should_list, shared.as_deref());
                }
            }
            UploadEvent::Failed { reason, .. } => {
                slot.item.error = Some(reason.clone());
                self.finish_failed(&mut slot, shared.as_deref());
            }
        }
        Ok(())
    }

    fn record_progress(
        &self,
        slot: &mut ItemSlot,
        offset: u64,
        total: u64,
        shared: Option<&Shared>,
    ) {
        slot.item.record_progress(offset, total);
        let Some(shared) = shared else {
            return;
        };

        shared.emit(ListChange::ItemProgress {
            item: self.item.key(),
            offset: slot.item.offset,
            total: slot.item.total_length,
        });
        if slot.item.transfer_complete() {
            // Some engines only signal completion through a final 100% progress.
            shared.emit(ListChange::ItemUpdated {
                item: self.item.key(),
            });
        }
    }

    fn adopt_result(
        &self,
        item: &mut UploadItem,
        id: Option<&str>,
        offset: u64,
        final_item: Option<&UploadItem>,
    ) {
        if let Some(final_item) = final_item {
            *item = final_item.clone();
            if item.queue_id.is_none() {
                item.queue_id = self.item.queue_id.clone();
            }
            if item.id.is_none() {
                item.id = id.filter(|id| !id.is_empty()).map(str::to_string);
            }
        } else if let Some(id) = id.filter(|id| !id.is_empty()) {
            item.id = Some(id.to_string());
            item.record_progress(offset, item.total_length);
        }
        item.error = None;
    }

    fn finish_succeeded(&self, slot: &mut ItemSlot, should_list: bool, shared: Option<&Shared>) {
        let key = self.item.key();
        tracing::debug!("Upload {} succeeded as {:?}", key, slot.item.id);

        if let Some(shared) = shared {
            shared.metrics().record_item_succeeded();
            if slot.listed {
                let kept = if should_list {
                    shared.confirm(key, &slot.item)
                } else {
                    shared.discard(key)
                };
                if let Err(e) = kept {
                    tracing::warn!("Upload {} dropped from the list: {}", key, e);
                    slot.item.error = Some(e.to_string());
                    slot.listed = false;
                } else if !should_list {
                    slot.listed = false;
                }
            }
            shared.emit(ListChange::ItemUpdated { item: key });
        }
        slot.unbind();
    }

    fn finish_failed(&self, slot: &mut ItemSlot, shared: Option<&Shared>) {
        let key = self.item.key();
        tracing::warn!(
            "Upload {} ({}) failed: {}",
            key,
            slot.item.filename,
            slot.item.error.as_deref().unwrap_or_default()
        );

        if let Some(shared) = shared {
            shared.metrics().record_item_failed();
            if slot.listed {
                if let Err(e) = shared.mark_failed(key) {
                    tracing::warn!("Could not record failure of {}: {}", key, e);
                }
            }
            shared.emit(ListChange::ItemUpdated { item: key });
        }
        slot.unbind();
    }
}

impl UploadListener for NotificationBridge {
    fn on_event(&self, event: &UploadEvent) {
        if !self.owns(event) {
            return;
        }

        match self.apply(event) {
            Ok(()) => {}
            Err(ListError::StaleSubscription(queue_id)) => {
                tracing::debug!("Dropping stale notification for {}", queue_id);
                if let Some(shared) = self.shared.upgrade() {
                    shared.metrics().record_stale_notification();
                }
            }
            Err(e) => tracing::warn!("Notification for {} not applied: {}", self.item.key(), e),
        }
    }
}
