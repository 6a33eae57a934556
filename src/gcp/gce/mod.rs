//! # Google Compute Engine (GCE) Client
//!
//! This module provides a client for the Google Compute Engine API, used to
//! provision the build coordinator VM.
//!
//! ## Submodules
//! - `client`: The [`ComputeApi`] seam and its REST implementation.
//! - `types`: Defines the data structures that are serialized to and deserialized from
//!   the GCE API.

/// Core client for GCE API requests.
pub mod client;
/// Data structures for the GCE API.
pub mod types;

// Re-export key components to provide a convenient public API for this module.
pub use crate::gcp::gce::client::{ApiError, ComputeApi, ComputeClient, GCE_API_BASE};
pub use crate::gcp::gce::types::*;
