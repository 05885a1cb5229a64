//! Runtime configuration
//!
//! Knobs recognized by a transactional world. There is exactly one today:
//! the per-ref history depth, which bounds memory per ref and decides how
//! old a snapshot can get before its readers are forced to retry.

/// Default per-ref history depth
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Configuration for a transactional world
///
/// Larger histories let long-running readers survive more concurrent
/// commits before retrying, at the cost of memory per ref.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum history entries retained per ref (default: 10, minimum: 1)
    pub max_history: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl Config {
    /// Create a config with an explicit history depth
    ///
    /// Values below 1 are clamped: a ref always retains its head entry.
    pub fn with_max_history(max_history: usize) -> Self {
        Config {
            max_history: max_history.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_history_depth() {
        assert_eq!(Config::default().max_history, DEFAULT_MAX_HISTORY);
    }

    #[test]
    fn test_with_max_history() {
        assert_eq!(Config::with_max_history(3).max_history, 3);
    }

    #[test]
    fn test_zero_clamped_to_one() {
        assert_eq!(Config::with_max_history(0).max_history, 1);
    }
}
