//! Data models for the file-storage core
//!
//! Principals and their roles, the contexts a stored file can belong to, and
//! the persisted file record.

mod context;
mod file;
mod principal;

// Re-export all models for convenient imports
pub use context::*;
pub use file::*;
pub use principal::*;
