//! Convenience re-exports for typical use
//!
//! ```
//! use mvstm::prelude::*;
//!
//! let cell = Ref::new(1i64);
//! let value = run(|| cell.alter(|n| n * 2)).unwrap();
//! assert_eq!(value, 2);
//! ```

pub use crate::{run, Config, Error, Ref, Result, World};
