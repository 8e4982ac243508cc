// State management module
//
// This module provides the UploadListManager, the facade the controller layer calls. It owns
// the list lock, composes the ordered collection with the deletion and reorder rules, and
// emits change events for presentation updates.

use crate::bridge::{Binding, NotificationBridge, TrackedItem};
use crate::collection::{Aggregates, EntryPhase, OrderedCollection, Relocation};
use crate::deletion::{DeletionPolicy, Removal};
use crate::engine::UploadEngine;
use crate::error::ListError;
use crate::metrics::Metrics;
use crate::models::{ItemKey, ListSettings, UploadItem};
use crate::presentation::{self, ItemView};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Change events emitted when the list is modified
///
/// Structural events are sent while the list lock is held, so every subscriber observes them
/// in the order the mutations happened.
#[derive(Clone, Debug, PartialEq)]
pub enum ListChange {
    /// A file was handed to the engine and appended to the list
    FileQueued {
        item: ItemKey,
        queue_id: String,
        filename: String,
    },

    /// The list changed shape; carries the totals recomputed in the same critical section
    StructuralChange(Aggregates),

    /// An item was moved; indices follow insertion order
    Relocated(Relocation),

    /// A delete was refused because of the configured minimum
    DeletionRefused { min_required: usize },

    /// A confirmed file was removed; the host should delete it server-side
    FileDeleted { item: ItemKey, id: String },

    /// An uploaded file could not be listed and was dropped; the host owns the server-side
    /// file and should clean it up
    FileRejected {
        item: ItemKey,
        id: String,
        reason: String,
    },

    /// Transfer progress for one item
    ItemProgress { item: ItemKey, offset: u64, total: u64 },

    /// An item's lifecycle state changed and should be re-rendered
    ItemUpdated { item: ItemKey },

    /// A confirmed item was swapped for a new record in place
    ItemReplaced { item: ItemKey, id: String },

    /// Settings have been updated
    SettingsChanged(ListSettings),
}

/// State shared between the manager and every notification bridge.
pub(crate) struct Shared {
    list: Mutex<OrderedCollection>,
    engine: Arc<dyn UploadEngine>,
    events: broadcast::Sender<ListChange>,
    metrics: Arc<Metrics>,
    next_key: AtomicU64,
}

impl Shared {
    pub fn emit(&self, change: ListChange) {
        // No receivers is fine; the count shows up in the metrics summary.
        match self.events.send(change) {
            Ok(_) => self.metrics.record_event_broadcast(),
            Err(_) => self.metrics.record_broadcast_error(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn emit_structural(&self, list: &OrderedCollection) {
        self.emit(ListChange::StructuralChange(list.aggregates()));
    }

    fn next_key(&self) -> ItemKey {
        ItemKey(self.next_key.fetch_add(1, Ordering::Relaxed))
    }

    /// Move a succeeded item to confirmed bookkeeping.
    ///
    /// Called by the bridge with the item lock held. An item that cannot be confirmed (its
    /// file id is already listed) is dropped from the list instead and reported through
    /// [`ListChange::FileRejected`].
    pub fn confirm(&self, key: ItemKey, item: &UploadItem) -> Result<(), ListError> {
        let id = item
            .id
            .as_deref()
            .ok_or_else(|| ListError::MissingId(item.filename.clone()))?;

        let mut list = self.list.lock();
        let result = list.promote(key, id, item.total_length, item.offset);
        if let Err(e) = &result {
            list.remove(key);
            self.emit(ListChange::FileRejected {
                item: key,
                id: id.to_string(),
                reason: e.to_string(),
            });
        }
        self.emit_structural(&list);
        result
    }

    /// Drop an entry whose upload finished without being listed.
    pub fn discard(&self, key: ItemKey) -> Result<(), ListError> {
        let mut list = self.list.lock();
        list.remove(key).ok_or(ListError::NotFound(key))?;
        self.emit_structural(&list);
        Ok(())
    }

    pub fn mark_failed(&self, key: ItemKey) -> Result<(), ListError> {
        let mut list = self.list.lock();
        list.mark_failed(key)?;
        self.emit_structural(&list);
        Ok(())
    }

    fn teardown(&self) -> usize {
        let handles = self.list.lock().display_handles();
        handles
            .iter()
            .filter(|handle| handle.lock().unbind())
            .count()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let released = self.teardown();
        if released > 0 {
            tracing::debug!("Released {} live subscriptions on teardown", released);
        }
    }
}

/// Thread-safe upload list with event emission
///
/// This is the central synchronization component that:
/// - Owns the list lock and the ordered collection behind it
/// - Subscribes one [`NotificationBridge`] per queued item and releases it exactly once
/// - Applies the deletion and reorder rules atomically with the mutation they guard
/// - Emits [`ListChange`] events through a tokio broadcast channel
///
/// # Locking
///
/// Operations that touch a single item take that item's lock first and the list lock
/// second, matching the order used by notification callbacks. Nothing acquires an item lock
/// while holding the list lock.
///
/// # Related Types
///
/// - [`crate::engine::UploadEngine`]: Delivers the notifications this list reacts to
/// - [`crate::collection::OrderedCollection`]: The sequence behind the list lock
/// - [`crate::presentation`]: Projects items into render-ready views
#[derive(Clone)]
pub struct UploadListManager {
    shared: Arc<Shared>,
}

impl UploadListManager {
    /// Create an empty list bound to `engine`
    ///
    /// The broadcast channel buffers `settings.event_buffer` events per subscriber.
    pub fn new(settings: ListSettings, engine: Arc<dyn UploadEngine>) -> Self {
        let (events, _) = broadcast::channel(settings.event_buffer.max(1));
        Self {
            shared: Arc::new(Shared {
                list: Mutex::new(OrderedCollection::new(settings)),
                engine,
                events,
                metrics: Arc::new(Metrics::new()),
                next_key: AtomicU64::new(1),
            }),
        }
    }

    /// Create a list pre-populated with files uploaded in an earlier session
    ///
    /// Records without a file id cannot be confirmed and are skipped.
    pub fn with_existing(
        settings: ListSettings,
        engine: Arc<dyn UploadEngine>,
        existing: Vec<UploadItem>,
    ) -> Self {
        let manager = Self::new(settings, engine);
        let total = existing.len();
        let mut loaded = 0;

        for item in existing {
            let filename = item.filename.clone();
            match manager.insert_confirmed(item, false) {
                Ok(_) => loaded += 1,
                Err(e) => tracing::warn!("Skipping existing upload {}: {}", filename, e),
            }
        }

        tracing::info!("Loaded {} of {} existing uploads", loaded, total);
        manager
    }

    /// Subscribe to list change events
    pub fn subscribe(&self) -> broadcast::Receiver<ListChange> {
        self.shared.events.subscribe()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.shared.metrics)
    }

    /// Append a queued item and subscribe it to engine notifications
    ///
    /// The item lock is held from subscription until the entry is listed, so notifications
    /// that race the enqueue wait until the item is fully inserted.
    ///
    /// # Errors
    /// - [`ListError::MissingQueueId`] if the item has no queue id
    /// - [`ListError::DuplicateQueueId`] if another in-flight item uses the same queue id
    /// - [`ListError::QueueFull`] if the list is at its maximum size
    pub fn enqueue(&self, item: UploadItem) -> Result<Arc<TrackedItem>, ListError> {
        let queue_id = item
            .queue_id
            .clone()
            .filter(|queue_id| !queue_id.is_empty())
            .ok_or_else(|| ListError::MissingQueueId(item.filename.clone()))?;
        let filename = item.filename.clone();
        let handle = Arc::new(TrackedItem::new(self.shared.next_key(), item));
        let key = handle.key();

        {
            let mut slot = handle.lock();
            let bridge = NotificationBridge::new(Arc::clone(&handle), Arc::downgrade(&self.shared));
            let subscription = self.shared.engine.subscribe(&queue_id, Arc::new(bridge));

            let mut list = self.shared.list.lock();
            if let Err(e) = list.add_queued(Arc::clone(&handle)) {
                drop(list);
                subscription.release();
                tracing::warn!("Refused to queue {}: {}", filename, e);
                return Err(e);
            }

            slot.listed = true;
            slot.binding = Binding::Live(subscription);
            self.shared.emit(ListChange::FileQueued {
                item: key,
                queue_id: queue_id.clone(),
                filename: filename.clone(),
            });
            self.shared.emit_structural(&list);
        }

        self.shared.metrics.record_item_enqueued();
        tracing::info!("Queued {} as {} ({})", filename, key, queue_id);
        Ok(handle)
    }

    /// Insert a file whose upload already succeeded
    pub fn add(&self, item: UploadItem) -> Result<Arc<TrackedItem>, ListError> {
        self.insert_confirmed(item, true)
    }

    fn insert_confirmed(
        &self,
        item: UploadItem,
        notify: bool,
    ) -> Result<Arc<TrackedItem>, ListError> {
        let id = item
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ListError::MissingId(item.filename.clone()))?;
        let (size, transferred) = (item.total_length, item.offset);
        let handle = Arc::new(TrackedItem::new(self.shared.next_key(), item));

        {
            let mut slot = handle.lock();
            let mut list = self.shared.list.lock();
            list.add_confirmed(Arc::clone(&handle), &id, size, transferred)?;
            slot.listed = true;
            if notify {
                self.shared.emit_structural(&list);
            }
        }
        Ok(handle)
    }

    /// Remove an item, cancelling its upload if it is still queued
    ///
    /// The subscription is released whether or not the engine accepts the cancellation.
    ///
    /// # Errors
    /// - [`ListError::StillUploading`] if bytes are already moving; the list is unchanged
    /// - [`ListError::BelowMinimum`] if deleting would leave too few confirmed files; a
    ///   [`ListChange::DeletionRefused`] event carries the minimum
    /// - [`ListError::DeleteDisabled`] if deleting confirmed files is switched off
    /// - [`ListError::NotFound`] if the item is not listed
    pub fn remove(&self, key: ItemKey) -> Result<Removal, ListError> {
        let handle = self.handle(key)?;
        let mut slot = handle.lock();
        let mut list = self.shared.list.lock();
        let phase = list.phase(key).ok_or(ListError::NotFound(key))?;

        let policy = DeletionPolicy::from_settings(list.settings());
        let decision = policy.decide(
            phase,
            slot.item.is_uploading(),
            list.confirmed_count(),
            &slot.item.filename,
        );
        let removal = match decision {
            Ok(removal) => removal,
            Err(ListError::BelowMinimum { min_required }) => {
                self.shared.metrics.record_deletion_refused();
                self.shared
                    .emit(ListChange::DeletionRefused { min_required });
                tracing::warn!("Refused to delete {}: minimum is {}", key, min_required);
                return Err(ListError::BelowMinimum { min_required });
            }
            Err(e) => {
                tracing::warn!("Refused to remove {}: {}", key, e);
                return Err(e);
            }
        };

        let entry = list.remove(key).ok_or(ListError::NotFound(key))?;
        match removal {
            Removal::Dequeue => {
                self.request_cancel(&handle);
                self.shared.metrics.record_item_dequeued();
            }
            Removal::Delete => {
                if let Some(id) = entry.id {
                    self.shared.emit(ListChange::FileDeleted { item: key, id });
                }
                self.shared.metrics.record_item_deleted();
            }
            Removal::Discard => {}
        }
        self.shared.emit_structural(&list);
        drop(list);

        slot.listed = false;
        slot.unbind();
        tracing::info!("Removed {} ({:?})", key, removal);
        Ok(removal)
    }

    /// Cancel an in-flight upload, whether or not it has started, and drop it from the list
    pub fn cancel(&self, key: ItemKey) -> Result<(), ListError> {
        let handle = self.handle(key)?;
        let mut slot = handle.lock();
        let mut list = self.shared.list.lock();

        match list.phase(key) {
            None => return Err(ListError::NotFound(key)),
            Some(EntryPhase::InFlight) => {}
            Some(_) => return Err(ListError::NotInFlight(key)),
        }

        list.remove(key);
        self.request_cancel(&handle);
        self.shared.metrics.record_item_dequeued();
        self.shared.emit_structural(&list);
        drop(list);

        slot.listed = false;
        slot.unbind();
        tracing::info!("Cancelled {}", key);
        Ok(())
    }

    // Runs inside the list lock; engines never deliver from `cancel`.
    fn request_cancel(&self, handle: &TrackedItem) {
        let Some(queue_id) = handle.queue_id() else {
            return;
        };
        if let Err(e) = self.shared.engine.cancel(queue_id) {
            tracing::warn!("Cancel request for {} failed: {}", queue_id, e);
        }
    }

    /// Move `source` onto the display position of `target`
    ///
    /// Returns `Ok(None)` without emitting anything when the source is dropped on itself.
    pub fn relocate(
        &self,
        source: ItemKey,
        target: ItemKey,
    ) -> Result<Option<Relocation>, ListError> {
        let mut list = self.shared.list.lock();
        if !list.settings().allow_reorder {
            return Err(ListError::ReorderDisabled);
        }

        let relocation = list.relocate(source, target)?;
        if let Some(relocation) = &relocation {
            self.shared.metrics.record_relocation();
            self.shared.emit(ListChange::Relocated(relocation.clone()));
            self.shared.emit_structural(&list);
            tracing::debug!(
                "Relocated {} from {} to {}",
                relocation.item,
                relocation.from_index,
                relocation.to_index
            );
        }
        Ok(relocation)
    }

    /// Recompute the list totals
    pub fn refresh_aggregates(&self) -> Aggregates {
        self.shared.list.lock().aggregates()
    }

    /// Swap the confirmed file `original_id` for `new_item`, keeping its position
    pub fn replace(
        &self,
        original_id: &str,
        new_item: UploadItem,
    ) -> Result<Arc<TrackedItem>, ListError> {
        let id = new_item
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ListError::MissingId(new_item.filename.clone()))?;
        let size = new_item.total_length;
        let handle = Arc::new(TrackedItem::new(self.shared.next_key(), new_item));

        let previous = {
            let mut slot = handle.lock();
            let mut list = self.shared.list.lock();
            let previous = list.replace_confirmed(original_id, Arc::clone(&handle), &id, size)?;
            slot.listed = true;
            self.shared.emit(ListChange::ItemReplaced {
                item: handle.key(),
                id: id.clone(),
            });
            self.shared.emit_structural(&list);
            previous
        };

        let mut old = previous.lock();
        old.listed = false;
        old.unbind();
        tracing::info!("Replaced {} with {}", original_id, id);
        Ok(handle)
    }

    /// Drop the confirmed file `id` after the host rejected it
    ///
    /// Unlike [`Self::remove`] this ignores the minimum count and emits no delete event.
    pub fn withdraw(&self, id: &str) -> Result<(), ListError> {
        let entry = {
            let mut list = self.shared.list.lock();
            let entry = list
                .remove_confirmed_by_id(id)
                .ok_or_else(|| ListError::UnknownId(id.to_string()))?;
            self.shared.emit_structural(&list);
            entry
        };

        let mut slot = entry.handle.lock();
        slot.listed = false;
        slot.unbind();
        tracing::info!("Withdrew {}", id);
        Ok(())
    }

    /// Release every live subscription. The list contents are left as they are.
    pub fn shutdown(&self) -> usize {
        let released = self.shared.teardown();
        tracing::info!("Upload list shut down, {} subscriptions released", released);
        released
    }

    // Queries

    fn handle(&self, key: ItemKey) -> Result<Arc<TrackedItem>, ListError> {
        self.shared
            .list
            .lock()
            .handle(key)
            .ok_or(ListError::NotFound(key))
    }

    /// Snapshot of every item in display order
    pub fn items(&self) -> Vec<UploadItem> {
        let handles = self.shared.list.lock().display_handles();
        handles.iter().map(|handle| handle.snapshot()).collect()
    }

    /// Render-ready views in display order
    pub fn views(&self) -> Vec<ItemView> {
        let (handles, settings) = {
            let list = self.shared.list.lock();
            (list.display_handles(), list.settings().clone())
        };
        handles
            .iter()
            .map(|handle| presentation::project(handle.key(), &handle.snapshot(), &settings))
            .collect()
    }

    pub fn get(&self, key: ItemKey) -> Option<UploadItem> {
        self.handle(key).ok().map(|handle| handle.snapshot())
    }

    /// Display position of `key`
    pub fn position(&self, key: ItemKey) -> Option<usize> {
        self.shared.list.lock().display_index(key)
    }

    pub fn settings(&self) -> ListSettings {
        self.shared.list.lock().settings().clone()
    }

    /// Update settings and emit change events
    ///
    /// # Example
    /// ```ignore
    /// manager.update_settings(|settings| settings.reverse_order = true);
    /// ```
    pub fn update_settings<F>(&self, settings_fn: F) -> ListSettings
    where
        F: FnOnce(&mut ListSettings),
    {
        let mut list = self.shared.list.lock();
        let old = list.settings().clone();
        settings_fn(list.settings_mut());
        let new = list.settings().clone();

        if new != old {
            self.shared.emit(ListChange::SettingsChanged(new.clone()));
            self.shared.emit_structural(&list);
            tracing::info!(
                "List settings updated: min={}, max={}, reverse={}, reorder={}, delete={}",
                new.min_file_count,
                new.max_file_count,
                new.reverse_order,
                new.allow_reorder,
                new.allow_delete
            );
        }
        new
    }

    /// Whether any listed item is actively transferring
    pub fn has_upload_in_progress(&self) -> bool {
        self.items().iter().any(UploadItem::is_uploading)
    }

    /// In-flight items still waiting for a result
    pub fn queue_count(&self) -> usize {
        self.refresh_aggregates().active_count()
    }

    pub fn len(&self) -> usize {
        self.shared.list.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.list.lock().is_empty()
    }
}
