// Ordered collection of upload entries
//
// The authoritative sequence shown by the list, stored in insertion order. Reversed display is
// a view over that order. Every method here runs under the list lock held by
// `UploadListManager` and must never acquire a per-item lock: the values aggregates depend on
// are cached on each entry when it changes phase.

use crate::bridge::TrackedItem;
use crate::error::ListError;
use crate::models::{ItemKey, ListSettings};
use crate::reorder;
use std::sync::Arc;

/// Bookkeeping bucket of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryPhase {
    /// Queued or uploading
    InFlight,
    /// Upload failed; shown with its error until removed
    Failed,
    /// Upload succeeded and counts toward the totals
    Confirmed,
}

#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub handle: Arc<TrackedItem>,
    pub phase: EntryPhase,
    pub queue_id: Option<String>,
    pub id: Option<String>,
    /// Declared size, captured when confirmed
    pub size: u64,
    /// Transferred bytes, captured when confirmed
    pub transferred: u64,
}

impl Entry {
    pub fn key(&self) -> ItemKey {
        self.handle.key()
    }
}

/// Derived totals, recomputed after every structural mutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Aggregates {
    pub confirmed_count: usize,
    /// Entries not yet confirmed, failed ones included
    pub in_flight_count: usize,
    /// Failed entries, a subset of `in_flight_count`
    pub failed_count: usize,
    /// Sum of declared sizes over confirmed entries
    pub total_size: u64,
    /// Sum of transferred bytes over confirmed entries
    pub uploaded_bytes: u64,
    /// Free upload slots, `None` when the list is unbounded
    pub remaining_seats: Option<usize>,
}

impl Aggregates {
    pub fn len(&self) -> usize {
        self.confirmed_count + self.in_flight_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// In-flight entries still waiting for a terminal notification.
    pub fn active_count(&self) -> usize {
        self.in_flight_count - self.failed_count
    }

    /// Entries that take a seat against `max_file_count`.
    pub fn occupied_seats(&self) -> usize {
        self.confirmed_count + self.active_count()
    }
}

/// A completed relocation as reported to observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relocation {
    pub item: ItemKey,
    /// Previous position in insertion order
    pub from_index: usize,
    /// New position in insertion order
    pub to_index: usize,
}

/// The ordered sequence of entries plus the settings that shape it.
#[derive(Debug, Default)]
pub struct OrderedCollection {
    entries: Vec<Entry>,
    settings: ListSettings,
}

impl OrderedCollection {
    pub fn new(settings: ListSettings) -> Self {
        Self {
            entries: Vec::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ListSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ListSettings {
        &mut self.settings
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn confirmed_count(&self) -> usize {
        self.count(EntryPhase::Confirmed)
    }

    fn count(&self, phase: EntryPhase) -> usize {
        self.entries.iter().filter(|e| e.phase == phase).count()
    }

    fn position(&self, key: ItemKey) -> Option<usize> {
        self.entries.iter().position(|e| e.key() == key)
    }

    pub fn contains(&self, key: ItemKey) -> bool {
        self.position(key).is_some()
    }

    pub fn phase(&self, key: ItemKey) -> Option<EntryPhase> {
        self.entry(key).map(|e| e.phase)
    }

    pub(crate) fn entry(&self, key: ItemKey) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key() == key)
    }

    pub fn handle(&self, key: ItemKey) -> Option<Arc<TrackedItem>> {
        self.entry(key).map(|e| Arc::clone(&e.handle))
    }

    /// Handles in display order.
    pub fn display_handles(&self) -> Vec<Arc<TrackedItem>> {
        let handles = self.entries.iter().map(|e| Arc::clone(&e.handle));
        if self.settings.reverse_order {
            handles.rev().collect()
        } else {
            handles.collect()
        }
    }

    /// Position of `key` in display order.
    pub fn display_index(&self, key: ItemKey) -> Option<usize> {
        self.position(key)
            .map(|i| reorder::to_display(i, self.len(), self.settings.reverse_order))
    }

    /// Append a new in-flight entry. Reversed display shows it first.
    pub fn add_queued(&mut self, handle: Arc<TrackedItem>) -> Result<(), ListError> {
        let queue_id = handle
            .queue_id()
            .map(str::to_string)
            .ok_or_else(|| ListError::MissingQueueId(handle.key().to_string()))?;

        let duplicate = self.entries.iter().any(|e| {
            e.phase == EntryPhase::InFlight && e.queue_id.as_deref() == Some(queue_id.as_str())
        });
        if duplicate {
            return Err(ListError::DuplicateQueueId(queue_id));
        }
        let occupied = self
            .entries
            .iter()
            .filter(|e| e.phase != EntryPhase::Failed)
            .count();
        if !self.settings.has_room(occupied) {
            return Err(ListError::QueueFull {
                max: self.settings.max_file_count,
            });
        }

        self.entries.push(Entry {
            handle,
            phase: EntryPhase::InFlight,
            queue_id: Some(queue_id),
            id: None,
            size: 0,
            transferred: 0,
        });
        Ok(())
    }

    /// Append an already-confirmed entry.
    pub fn add_confirmed(
        &mut self,
        handle: Arc<TrackedItem>,
        id: &str,
        size: u64,
        transferred: u64,
    ) -> Result<(), ListError> {
        self.ensure_unique_id(id, None)?;
        self.entries.push(Entry {
            queue_id: handle.queue_id().map(str::to_string),
            handle,
            phase: EntryPhase::Confirmed,
            id: Some(id.to_string()),
            size,
            transferred,
        });
        Ok(())
    }

    fn ensure_unique_id(&self, id: &str, except: Option<ItemKey>) -> Result<(), ListError> {
        let taken = self.entries.iter().any(|e| {
            e.phase == EntryPhase::Confirmed
                && e.id.as_deref() == Some(id)
                && Some(e.key()) != except
        });
        if taken {
            Err(ListError::DuplicateId(id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Move an entry to confirmed bookkeeping without changing its position.
    pub fn promote(
        &mut self,
        key: ItemKey,
        id: &str,
        size: u64,
        transferred: u64,
    ) -> Result<(), ListError> {
        self.ensure_unique_id(id, Some(key))?;
        let index = self.position(key).ok_or(ListError::NotFound(key))?;

        let entry = &mut self.entries[index];
        entry.phase = EntryPhase::Confirmed;
        entry.id = Some(id.to_string());
        entry.size = size;
        entry.transferred = transferred;
        Ok(())
    }

    /// Record that an in-flight entry failed.
    pub fn mark_failed(&mut self, key: ItemKey) -> Result<(), ListError> {
        let index = self.position(key).ok_or(ListError::NotFound(key))?;
        let entry = &mut self.entries[index];
        if entry.phase == EntryPhase::InFlight {
            entry.phase = EntryPhase::Failed;
        }
        Ok(())
    }

    pub(crate) fn remove(&mut self, key: ItemKey) -> Option<Entry> {
        self.position(key).map(|i| self.entries.remove(i))
    }

    pub(crate) fn remove_confirmed_by_id(&mut self, id: &str) -> Option<Entry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.phase == EntryPhase::Confirmed && e.id.as_deref() == Some(id))?;
        Some(self.entries.remove(index))
    }

    /// Swap the confirmed entry with file id `original_id` for `handle`, keeping its position.
    ///
    /// Returns the handle that was replaced.
    pub(crate) fn replace_confirmed(
        &mut self,
        original_id: &str,
        handle: Arc<TrackedItem>,
        id: &str,
        size: u64,
    ) -> Result<Arc<TrackedItem>, ListError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.phase == EntryPhase::Confirmed && e.id.as_deref() == Some(original_id))
            .ok_or_else(|| ListError::UnknownId(original_id.to_string()))?;
        let replaced_key = self.entries[index].key();
        self.ensure_unique_id(id, Some(replaced_key))?;

        let entry = &mut self.entries[index];
        let previous = std::mem::replace(&mut entry.handle, handle);
        entry.queue_id = entry.handle.queue_id().map(str::to_string);
        entry.id = Some(id.to_string());
        entry.size = size;
        entry.transferred = size;
        Ok(previous)
    }

    /// Relocate `source` onto the display position of `target`.
    ///
    /// Returns `Ok(None)` when the source is dropped on itself.
    pub fn relocate(
        &mut self,
        source: ItemKey,
        target: ItemKey,
    ) -> Result<Option<Relocation>, ListError> {
        let current = self.display_index(source).ok_or(ListError::NotFound(source))?;
        let target_index = self.display_index(target).ok_or(ListError::NotFound(target))?;

        let Some(plan) =
            reorder::resolve(current, target_index, self.len(), self.settings.reverse_order)
        else {
            return Ok(None);
        };

        reorder::apply(&mut self.entries, plan.from_index, plan.to_index);
        Ok(Some(Relocation {
            item: source,
            from_index: plan.from_index,
            to_index: plan.to_index,
        }))
    }

    /// Recompute totals from the current entries.
    pub fn aggregates(&self) -> Aggregates {
        let mut totals = Aggregates::default();
        for entry in &self.entries {
            match entry.phase {
                EntryPhase::Confirmed => {
                    totals.confirmed_count += 1;
                    totals.total_size += entry.size;
                    totals.uploaded_bytes += entry.transferred;
                }
                EntryPhase::InFlight => totals.in_flight_count += 1,
                EntryPhase::Failed => {
                    totals.in_flight_count += 1;
                    totals.failed_count += 1;
                }
            }
        }
        totals.remaining_seats = self.settings.remaining_seats(totals.occupied_seats());
        totals
    }
}
