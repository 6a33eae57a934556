//! # Google Cloud Storage (GCS) Client
//!
//! Uploads release artifacts to a storage bucket.
//!
//! ## Submodules
//! - `client`: Contains the core client logic for making API requests to GCS.
//! - `types`: Defines the data structures that are serialized to and deserialized from
//!   the GCS API.

/// Core client for GCS API requests.
pub mod client;
/// Data structures for the GCS API.
pub mod types;

// Re-export key components to provide a convenient public API for this module.
pub use client::{StorageError, upload_object, upload_request};
pub use types::*;
