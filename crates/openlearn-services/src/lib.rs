//! OpenLearn Services Layer
//!
//! Scoped access to stored course files. Every operation resolves its target,
//! passes it through the `AccessGate` and only then touches object storage and
//! persistence. Transport layers stay outside this crate and pass the acting
//! principal explicitly.

pub mod access;
pub mod files;

pub use access::{AccessDecision, AccessGate, AccessTarget};
pub use files::{BulkDeleteSummary, ScopedFileService};
pub use openlearn_storage::{BlobStream, StorageGateway};
