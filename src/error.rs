//! Error types for list operations and the upload engine contract.

use crate::models::ItemKey;
use thiserror::Error;

/// Errors returned by [`crate::state::UploadListManager`] operations.
///
/// Operation errors go back to the caller that issued the operation. Notification callbacks
/// have no caller, so the bridge logs whatever it cannot apply and drops it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    #[error("{0} is still uploading; wait for it to finish or cancel it")]
    StillUploading(String),

    #[error("Can't delete any file: {min_required} files must be attached")]
    BelowMinimum { min_required: usize },

    #[error("Notification for {0} arrived after its subscription was released")]
    StaleSubscription(String),

    #[error("Queue id {0} is already in the list")]
    DuplicateQueueId(String),

    #[error("File id {0} is already in the list")]
    DuplicateId(String),

    #[error("{0} has no queue id")]
    MissingQueueId(String),

    #[error("{0} has no file id")]
    MissingId(String),

    #[error("Item {0} is not in the list")]
    NotFound(ItemKey),

    #[error("Item {0} is not queued or uploading")]
    NotInFlight(ItemKey),

    #[error("No uploaded file with id {0}")]
    UnknownId(String),

    #[error("Upload list is full ({max} files)")]
    QueueFull { max: usize },

    #[error("Deleting uploaded files is disabled")]
    DeleteDisabled,

    #[error("Reordering files is disabled")]
    ReorderDisabled,
}

/// Errors reported by an upload engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unknown queue id {0}")]
    UnknownQueueId(String),

    #[error("Transfer {0} is already running")]
    Locked(String),

    #[error("Transfer {0} was cancelled")]
    Cancelled(String),
}
