//! Transactional runtime for mvstm
//!
//! This crate implements multi-version concurrency control over
//! versioned refs:
//! - Ref<T>: cloneable handles to versioned cells
//! - TransactionContext: per-attempt working set (reads, writes,
//!   commutes, ensures)
//! - World: the write-point counter, commit lock, and run loop
//! - A per-thread active-transaction slot consulted by ref operations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod current;
pub mod refs;
pub mod transaction;
pub(crate) mod validation;
pub mod world;

pub use refs::{Ref, RefId};
pub use transaction::TransactionContext;
pub use world::{run, World};

// Re-export the foundation types for convenience
pub use mvstm_core::{Config, Error, Result, Versioned, WritePoint, DEFAULT_MAX_HISTORY};
