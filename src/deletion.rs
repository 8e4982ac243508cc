//! Rules for removing an entry from the list.
//!
//! Confirmed files are protected by the configured minimum count and the `allow_delete`
//! switch. In-flight files that have not started moving bytes can always be dequeued, since
//! dropping them does not lower the confirmed count. Failed files are simply dropped from
//! the display.

use crate::collection::EntryPhase;
use crate::error::ListError;
use crate::models::ListSettings;

/// What removing an entry amounts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// In-flight: ask the engine to cancel, then drop the entry
    Dequeue,
    /// Confirmed: drop the entry and tell the host to delete the file
    Delete,
    /// Failed: drop the entry, nothing to cancel
    Discard,
}

/// True when one confirmed file can go without falling below `min_required`.
pub fn can_delete(confirmed_count: usize, min_required: usize) -> bool {
    confirmed_count
        .checked_sub(1)
        .is_some_and(|remaining| remaining >= min_required)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeletionPolicy {
    pub min_file_count: usize,
    pub allow_delete: bool,
}

impl DeletionPolicy {
    pub fn from_settings(settings: &ListSettings) -> Self {
        Self {
            min_file_count: settings.min_file_count,
            allow_delete: settings.allow_delete,
        }
    }

    /// Decide how an entry in `phase` may be removed.
    ///
    /// `uploading` is the item's state read under its own lock; `confirmed_count` is read under
    /// the list lock.
    pub fn decide(
        &self,
        phase: EntryPhase,
        uploading: bool,
        confirmed_count: usize,
        filename: &str,
    ) -> Result<Removal, ListError> {
        match phase {
            EntryPhase::InFlight if uploading => {
                Err(ListError::StillUploading(filename.to_string()))
            }
            EntryPhase::InFlight => Ok(Removal::Dequeue),
            EntryPhase::Failed => Ok(Removal::Discard),
            EntryPhase::Confirmed if !self.allow_delete => Err(ListError::DeleteDisabled),
            EntryPhase::Confirmed if !can_delete(confirmed_count, self.min_file_count) => {
                Err(ListError::BelowMinimum {
                    min_required: self.min_file_count,
                })
            }
            EntryPhase::Confirmed => Ok(Removal::Delete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(min_file_count: usize) -> DeletionPolicy {
        DeletionPolicy {
            min_file_count,
            allow_delete: true,
        }
    }

    #[test]
    fn test_can_delete_boundary() {
        assert!(!can_delete(2, 2));
        assert!(can_delete(3, 2));
        assert!(can_delete(1, 0));
        assert!(!can_delete(0, 0));
    }

    #[test]
    fn test_confirmed_below_minimum_is_refused() {
        assert_eq!(
            policy(2).decide(EntryPhase::Confirmed, false, 2, "a.pdf"),
            Err(ListError::BelowMinimum { min_required: 2 })
        );
        assert_eq!(
            policy(2).decide(EntryPhase::Confirmed, false, 3, "a.pdf"),
            Ok(Removal::Delete)
        );
    }

    #[test]
    fn test_in_flight_ignores_minimum() {
        assert_eq!(
            policy(5).decide(EntryPhase::InFlight, false, 0, "a.pdf"),
            Ok(Removal::Dequeue)
        );
    }

    #[test]
    fn test_uploading_is_refused() {
        assert_eq!(
            policy(0).decide(EntryPhase::InFlight, true, 0, "a.pdf"),
            Err(ListError::StillUploading("a.pdf".to_string()))
        );
    }

    #[test]
    fn test_failed_is_discarded() {
        assert_eq!(
            policy(5).decide(EntryPhase::Failed, false, 0, "a.pdf"),
            Ok(Removal::Discard)
        );
    }

    #[test]
    fn test_delete_disabled() {
        let policy = DeletionPolicy {
            min_file_count: 0,
            allow_delete: false,
        };
        assert_eq!(
            policy.decide(EntryPhase::Confirmed, false, 4, "a.pdf"),
            Err(ListError::DeleteDisabled)
        );
        assert_eq!(
            policy.decide(EntryPhase::InFlight, false, 4, "a.pdf"),
            Ok(Removal::Dequeue)
        );
    }
}
