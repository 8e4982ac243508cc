use serde::{Deserialize, Serialize};

/// User configuration from `UploadList Config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub upload_list: ListSettings,
}

/// Behaviour switches for one upload list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListSettings {
    /// Confirmed files that must remain attached; deletions below this are refused
    pub min_file_count: usize,

    /// Maximum number of entries the list accepts, 0 for no limit
    pub max_file_count: usize,

    pub allow_delete: bool,
    pub allow_reorder: bool,

    /// Display the most recently added file first
    pub reverse_order: bool,

    /// Shorter progress labels for tile layouts
    pub compact_layout: bool,

    /// Capacity of the change-event broadcast channel
    pub event_buffer: usize,

    pub debug_mode: bool,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            min_file_count: 0,
            max_file_count: default_max_file_count(),
            allow_delete: true,
            allow_reorder: false,
            reverse_order: false,
            compact_layout: false,
            event_buffer: default_event_buffer(),
            debug_mode: false,
        }
    }
}

impl ListSettings {
    /// Free slots for new uploads when `occupied` seats are taken.
    ///
    /// Confirmed files and uploads still in progress take a seat, failed rows do not.
    /// Returns `None` when the list has no maximum.
    pub fn remaining_seats(&self, occupied: usize) -> Option<usize> {
        (self.max_file_count > 0).then(|| self.max_file_count.saturating_sub(occupied))
    }

    /// Whether one more upload fits when `occupied` seats are taken.
    pub fn has_room(&self, occupied: usize) -> bool {
        self.remaining_seats(occupied).is_none_or(|free| free > 0)
    }
}

fn default_max_file_count() -> usize {
    100
}

fn default_event_buffer() -> usize {
    100
}
