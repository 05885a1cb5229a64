//! # mvstm
//!
//! Software transactional memory over multi-version concurrency control.
//!
//! Application code groups reads and writes to mutable cells ([`Ref`])
//! into atomic transactions: a transaction commits all of its effects at
//! a single logical instant or retries from scratch, and readers never
//! observe partial effects of other transactions.
//!
//! # Quick Start
//!
//! ```
//! use mvstm::{run, Ref};
//!
//! fn main() -> mvstm::Result<()> {
//!     let checking = Ref::new(100i64);
//!     let savings = Ref::new(0i64);
//!
//!     // Transfer atomically: other threads see both updates or neither.
//!     run(|| {
//!         let amount = 10;
//!         checking.alter(|b| b - amount)?;
//!         savings.alter(|b| b + amount)?;
//!         Ok(())
//!     })?;
//!
//!     assert_eq!(checking.read()?, 90);
//!     assert_eq!(savings.read()?, 10);
//!     Ok(())
//! }
//! ```
//!
//! # Operations
//!
//! | Operation | Context | Effect |
//! |-----------|---------|--------|
//! | [`Ref::new`] | any | Create a versioned cell |
//! | [`Ref::read`] | any | Transactional read inside `run`; latest value outside |
//! | [`Ref::write`] | transaction | Stage a new value |
//! | [`Ref::alter`] | transaction | Stage `f(current)`, return it |
//! | [`Ref::commute`] | transaction | Stage a commutative update, re-applied at commit |
//! | [`Ref::ensure`] | transaction | Validate the ref at commit without writing it |
//! | [`run`] | any | Drive a body to a successful commit (nested calls inline) |
//!
//! # Consistency model
//!
//! Every transaction reads from a snapshot at its read point - the
//! global write point captured when the attempt began. Commits are
//! serialized under a single commit lock and totally ordered by the
//! write points they allocate; a transaction that wrote or ensured a ref
//! another commit moved past its read point is transparently retried.
//! Commuted refs skip that validation and have their update chains
//! re-applied to the latest value at commit, so commute-only workloads
//! never conflict.
//!
//! Each ref retains a bounded history (configurable via
//! [`Config::max_history`], default 10) so readers with older read
//! points can still be served; a reader whose snapshot has aged out of
//! the window is retried against a fresh one.
//!
//! # Worlds
//!
//! The free functions and `Ref::new` operate on a process-wide default
//! [`World`]. Independent worlds - separate write-point counters, commit
//! locks, and configurations - can be created with [`World::new`] for
//! tests or embedded uses.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod prelude;

pub use mvstm_core::{Config, Error, Result, Versioned, WritePoint, DEFAULT_MAX_HISTORY};
pub use mvstm_runtime::{run, Ref, RefId, TransactionContext, World};
