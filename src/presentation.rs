//! Render-ready projection of list items.
//!
//! Pure functions over [`UploadItem`] and [`ListSettings`]. The list never renders anything
//! itself; a presentation layer calls [`project`] for each item (usually through
//! [`crate::state::UploadListManager::views`]) and [`summary`] for the info line.

use crate::collection::Aggregates;
use crate::models::{ItemKey, ItemStatus, ListSettings, UploadItem};

const SIZE_UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];

/// The one action a row offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemAction {
    Cancel,
    Delete,
    Hidden,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileIcon {
    Image,
    Video,
    Generic,
}

/// Everything needed to draw one row.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemView {
    pub key: ItemKey,
    pub filename: String,
    pub status: ItemStatus,
    /// Transfer progress in `0.0..=1.0`
    pub fraction: f64,
    pub percent: u8,
    pub progress_label: String,
    pub size_label: String,
    pub error: Option<String>,
    pub action: ItemAction,
    pub icon: FileIcon,
}

/// Project `item` into a row view.
pub fn project(key: ItemKey, item: &UploadItem, settings: &ListSettings) -> ItemView {
    let status = item.status();
    let percent = percent(item.offset, item.total_length);

    let action = match status {
        ItemStatus::Queued | ItemStatus::Uploading => ItemAction::Cancel,
        ItemStatus::Succeeded if settings.allow_delete => ItemAction::Delete,
        ItemStatus::Succeeded => ItemAction::Hidden,
        // Failed rows can always be dismissed.
        ItemStatus::Failed => ItemAction::Delete,
    };

    let icon = if item.is_image() {
        FileIcon::Image
    } else if item.is_video() {
        FileIcon::Video
    } else {
        FileIcon::Generic
    };

    ItemView {
        key,
        filename: item.filename.clone(),
        status,
        fraction: fraction(item.offset, item.total_length),
        percent,
        progress_label: progress_label(item.offset, item.total_length, settings.compact_layout),
        size_label: readable_file_size(item.total_length),
        error: item.error.clone(),
        action,
        icon,
    }
}

fn fraction(offset: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (offset as f64 / total as f64).clamp(0.0, 1.0)
}

/// Whole percent transferred, truncated.
pub fn percent(offset: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (offset.min(total) * 100 / total) as u8
}

/// Progress text: `"1.5 MB/42%"` in compact layouts, `"1.5 MB / 3.6 MB (42%)"` otherwise.
pub fn progress_label(offset: u64, total: u64, compact: bool) -> String {
    let pct = percent(offset, total);
    if compact {
        format!("{}/{}%", readable_file_size(offset), pct)
    } else {
        format!(
            "{} / {} ({}%)",
            readable_file_size(offset),
            readable_file_size(total),
            pct
        )
    }
}

/// Human-readable size with binary steps and at most one decimal.
pub fn readable_file_size(size: u64) -> String {
    if size == 0 {
        return "0".to_string();
    }

    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let mut number = format!("{value:.1}");
    if number.ends_with(".0") {
        number.truncate(number.len() - 2);
    }
    format!("{} {}", number, SIZE_UNITS[unit])
}

/// Info line shown under the list.
///
/// Every displayed row that is not confirmed counts as queued, failed rows included.
pub fn summary(totals: &Aggregates) -> String {
    if totals.is_empty() {
        return "No files uploaded yet.".to_string();
    }
    format!(
        "{} uploaded files / {} (+{} queued)",
        totals.confirmed_count,
        readable_file_size(totals.total_size),
        totals.in_flight_count
    )
}
