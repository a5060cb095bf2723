//! OpenLearn Storage Library
//!
//! Object-store addressing and lifecycle for uploaded course files.
//!
//! # Storage key format
//!
//! Keys are derived from the owning context and the uploader, never randomized:
//!
//! - **Graded work**: `a_{assignment_id}/{uploader_id}/{filename}`
//! - **Portfolio entry**: `p_{portfolio_item_id}/{uploader_id}/{filename}`
//!
//! Uploading the same filename to the same context twice overwrites the first
//! object. Records persist the object's location as a stored reference of the
//! form `https://{host}/{bucket}/{key}`; see the `keys` module for decoding.

pub mod backend;
pub mod factory;
pub mod gateway;
pub mod keys;
pub mod traits;

// Re-export commonly used types
pub use backend::ObjectStoreBlobStore;
pub use factory::create_blob_store;
pub use gateway::{
    group_by_bucket, BatchFailure, BucketBatch, BulkDeleteReport, StorageGateway, StoredObject,
};
pub use keys::BlobAddress;
pub use openlearn_core::StorageBackend;
pub use traits::{BlobStore, BlobStream, StorageError, StorageResult};
