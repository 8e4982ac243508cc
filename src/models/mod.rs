//! Data models for the upload list.
//!
//! - [`UploadItem`]: one file with its transfer fields and derived lifecycle predicates
//! - [`ItemKey`]: stable list handle for an item
//! - [`ListSettings`] / [`UserConfig`]: behaviour switches loaded from `UploadList Config.yaml`
//!
//! Items are never shared directly. [`crate::bridge::TrackedItem`] wraps each one in its own
//! lock and [`crate::collection::OrderedCollection`] orders them under the list lock.

pub mod config;
pub mod item;

pub use config::{ListSettings, UserConfig};
pub use item::{ItemKey, ItemStatus, UploadItem};
