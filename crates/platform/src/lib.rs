//! Record store abstraction for stride.
//!
//! This crate defines the [`RecordStore`] trait the engine talks to, the
//! errors a store can report, and an in-memory implementation.
//!
//! # Example
//!
//! ```ignore
//! use stride_platform::{MemoryStore, RecordStore};
//!
//! let store = MemoryStore::with_records(records);
//! let session = store.resolve_session("session-1")?;
//! ```

mod aggregate;
mod error;
mod memory;
mod store;

pub use aggregate::aggregate_records;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::RecordStore;
