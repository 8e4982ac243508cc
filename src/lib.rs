// UploadList - Concurrent upload list synchronization
//
// This is the library crate containing the list state machine, its locking discipline and the
// upload engine contract. The binary crate (main.rs) drives a demo session with the in-process
// engine.

pub mod bridge;
pub mod collection;
pub mod config;
pub mod deletion;
pub mod engine;
pub mod error;
pub mod lock;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod presentation;
pub mod reorder;
pub mod state;

// Re-export commonly used types for convenience
pub use bridge::TrackedItem;
pub use collection::{Aggregates, EntryPhase, Relocation};
pub use config::ConfigManager;
pub use deletion::{DeletionPolicy, Removal};
pub use engine::{LocalEngine, Subscription, UploadEngine, UploadEvent, UploadListener};
pub use error::{EngineError, ListError};
pub use models::{ItemKey, ItemStatus, ListSettings, UploadItem, UserConfig};
pub use state::{ListChange, UploadListManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
