//! Durable blob storage for Docket collections.
//!
//! Every collection is persisted as a single serialized blob addressed by the
//! collection name. This crate defines the storage seam and the backends that
//! ship with Docket.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsBlobStore`] -- one file per blob inside a bucket directory
//!
//! # Design Rules
//!
//! 1. A write always replaces the entire blob; there is no partial update.
//! 2. A missing blob is `Ok(None)`, not an error.
//! 3. The store never interprets blob contents.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod backend;
pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use backend::StoreBackend;
pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use memory::InMemoryBlobStore;
pub use traits::BlobStore;
