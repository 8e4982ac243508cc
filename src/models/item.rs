use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle for one entry of the upload list.
///
/// Keys are assigned by [`crate::state::UploadListManager`] when an item enters the list and
/// are never reused, even after the item is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(pub u64);

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state derived from an [`UploadItem`]'s fields.
///
/// `Uploading` is a presentation sub-state of `Queued`; nothing stores it separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemStatus {
    Queued,
    Uploading,
    Succeeded,
    Failed,
}

/// One file, uploaded or in flight.
///
/// Plain data: every mutation happens through the per-item lock owned by
/// [`crate::bridge::TrackedItem`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadItem {
    /// Server-side id, assigned once the upload completes
    #[serde(default)]
    pub id: Option<String>,

    /// Engine queue id, assigned at enqueue time and never reused
    #[serde(default)]
    pub queue_id: Option<String>,

    pub filename: String,

    #[serde(default)]
    pub mime_type: Option<String>,

    /// Bytes transferred so far
    #[serde(default)]
    pub offset: u64,

    /// Declared size in bytes, 0 when unknown
    #[serde(default)]
    pub total_length: u64,

    #[serde(default)]
    pub error: Option<String>,

    /// Set by a Started notification
    #[serde(skip)]
    pub started: bool,
}

impl UploadItem {
    /// A file handed to the engine under `queue_id`.
    pub fn queued(
        queue_id: impl Into<String>,
        filename: impl Into<String>,
        mime_type: Option<String>,
        total_length: u64,
    ) -> Self {
        Self {
            queue_id: Some(queue_id.into()),
            filename: filename.into(),
            mime_type,
            total_length,
            ..Self::default()
        }
    }

    /// A file whose upload already completed under `id`.
    pub fn uploaded(
        id: impl Into<String>,
        filename: impl Into<String>,
        mime_type: Option<String>,
        total_length: u64,
    ) -> Self {
        Self {
            id: Some(id.into()),
            filename: filename.into(),
            mime_type,
            offset: total_length,
            total_length,
            ..Self::default()
        }
    }

    /// Has a queue id and no terminal result yet.
    pub fn is_queued(&self) -> bool {
        self.queue_id.is_some() && self.id.is_none() && self.error.is_none()
    }

    /// Queued and the engine has started moving bytes.
    pub fn is_uploading(&self) -> bool {
        self.is_queued() && (self.started || self.offset > 0)
    }

    /// Succeeded: the server assigned an id.
    pub fn is_finished(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.id.is_none() && self.error.is_some()
    }

    pub fn status(&self) -> ItemStatus {
        if self.is_finished() {
            ItemStatus::Succeeded
        } else if self.is_failed() {
            ItemStatus::Failed
        } else if self.is_uploading() {
            ItemStatus::Uploading
        } else {
            ItemStatus::Queued
        }
    }

    /// Record transferred bytes, keeping `offset <= total_length` once the size is known.
    pub fn record_progress(&mut self, offset: u64, total: u64) {
        if total > 0 {
            self.total_length = total;
        }
        self.offset = if self.total_length > 0 {
            offset.min(self.total_length)
        } else {
            offset
        };
    }

    /// True once every declared byte has been transferred.
    pub fn transfer_complete(&self) -> bool {
        self.total_length > 0 && self.offset >= self.total_length
    }

    pub fn is_image(&self) -> bool {
        self.mime_contains("image")
    }

    pub fn is_video(&self) -> bool {
        self.mime_contains("video")
    }

    fn mime_contains(&self, needle: &str) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.to_ascii_lowercase().contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_item_predicates() {
        let item = UploadItem::queued("q-1", "a.png", Some("image/png".to_string()), 100);

        assert!(item.is_queued());
        assert!(!item.is_uploading());
        assert!(!item.is_finished());
        assert_eq!(item.status(), ItemStatus::Queued);
    }

    #[test]
    fn test_started_signal_marks_uploading() {
        let mut item = UploadItem::queued("q-1", "a.png", None, 100);
        item.started = true;

        assert!(item.is_uploading());
        assert_eq!(item.status(), ItemStatus::Uploading);
    }

    #[test]
    fn test_nonzero_offset_marks_uploading() {
        let mut item = UploadItem::queued("q-1", "a.png", None, 100);
        item.record_progress(10, 100);

        assert!(item.is_uploading());
    }

    #[test]
    fn test_uploaded_item_is_finished() {
        let item = UploadItem::uploaded("srv-1", "a.png", None, 42);

        assert!(item.is_finished());
        assert!(!item.is_queued());
        assert_eq!(item.offset, 42);
        assert_eq!(item.status(), ItemStatus::Succeeded);
    }

    #[test]
    fn test_error_is_terminal() {
        let mut item = UploadItem::queued("q-1", "a.png", None, 100);
        item.record_progress(50, 100);
        item.error = Some("connection reset".to_string());

        assert!(!item.is_queued());
        assert!(!item.is_uploading());
        assert!(item.is_failed());
        assert_eq!(item.status(), ItemStatus::Failed);
    }

    #[test]
    fn test_progress_clamped_to_total() {
        let mut item = UploadItem::queued("q-1", "a.bin", None, 100);
        item.record_progress(250, 100);

        assert_eq!(item.offset, 100);
        assert!(item.transfer_complete());
    }

    #[test]
    fn test_progress_with_unknown_total() {
        let mut item = UploadItem::queued("q-1", "a.bin", None, 0);
        item.record_progress(250, 0);

        assert_eq!(item.offset, 250);
        assert!(!item.transfer_complete());
    }

    #[test]
    fn test_mime_detection_is_case_insensitive() {
        let image = UploadItem::queued("q", "a", Some("IMAGE/JPEG".to_string()), 0);
        let video = UploadItem::queued("q", "b", Some("video/mp4".to_string()), 0);
        let other = UploadItem::queued("q", "c", None, 0);

        assert!(image.is_image());
        assert!(video.is_video());
        assert!(!other.is_image() && !other.is_video());
    }
}
