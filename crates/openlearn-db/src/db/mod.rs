//! Database repositories for the file-storage core
//!
//! `files` persists file records in `file_information`. `context` resolves
//! assignments and portfolio items into owning contexts from the course
//! tables, which belong to the wider platform and are only read here.

pub mod context;
pub mod files;

pub use context::{ContextDirectory, PgContextDirectory};
pub use files::{FileInformationRow, FileRepository, PgFileRepository};
