//! Core types for mvstm
//!
//! This crate defines the foundational, synchronization-free types used by
//! the transactional runtime:
//! - WritePoint: global write-point identifiers
//! - Versioned<T>: a value paired with the write point that published it
//! - VersionHistory<T>: bounded newest-first history of a ref
//! - Config: runtime configuration (history depth)
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod history;
pub mod versioned;
pub mod write_point;

pub use config::{Config, DEFAULT_MAX_HISTORY};
pub use error::{Error, Result};
pub use history::VersionHistory;
pub use versioned::Versioned;
pub use write_point::WritePoint;
