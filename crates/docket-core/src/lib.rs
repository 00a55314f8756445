//! Collection cache engine for Docket.
//!
//! A Docket collection is a named key -> JSON mapping persisted as a single
//! blob in a [`docket_store::BlobStore`]. This crate owns the in-memory side:
//!
//! - [`CollectionRegistry`] -- one [`Collection`] per name, created on first
//!   reference and kept for the life of the registry
//! - [`Collection`] -- lazy hydration, serialized mutate-and-persist, and
//!   lock-free snapshot reads
//! - [`search`] -- diacritic-insensitive linear scan bounded by a deadline
//!   and a cancellation token
//! - [`Sweeper`] -- periodic eviction of idle collections
//!
//! # Consistency
//!
//! Every mutation rewrites the whole blob before returning, so a successful
//! call is durable. Reads run against an immutable snapshot and never block
//! behind a writer. A failed persist is reported to the caller but the
//! cached mutation is kept; the next successful persist catches the store
//! up.

pub mod collection;
pub mod config;
pub mod error;
pub mod key;
pub mod registry;
pub mod search;
pub mod sweeper;

pub use collection::{CacheState, Collection, Entries};
pub use config::CacheSettings;
pub use error::{CoreError, CoreResult};
pub use key::{validate_collection_name, EntryKey};
pub use registry::CollectionRegistry;
pub use search::{Query, ScanStatus, SearchOutcome};
pub use sweeper::Sweeper;
pub use tokio_util::sync::CancellationToken;
