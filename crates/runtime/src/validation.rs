//! Commit-time validation
//!
//! A transaction may publish only if no other commit has moved a ref it
//! wrote or ensured past its read point. Commuted-only refs are exempt:
//! their chains are re-applied to the latest head instead, which is the
//! point of commute. Validation runs under the commit lock, so the head
//! write points it compares cannot move before publication.

use crate::refs::RefId;
use crate::transaction::TransactionContext;
use mvstm_core::WritePoint;

/// Result of validating one transaction against current ref heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Every written and ensured ref is unchanged since the snapshot.
    Clean,
    /// A written or ensured ref moved past the read point; the attempt
    /// must be retried.
    Conflict {
        /// The ref that moved.
        ref_id: RefId,
        /// The transaction's snapshot read point.
        read_point: WritePoint,
        /// The ref's head write point at validation time.
        current: WritePoint,
    },
}

impl Outcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, Outcome::Clean)
    }
}

/// Validate the written and ensured sets against current head write
/// points. First conflict wins; there is nothing to collect since any
/// conflict forces a full retry.
pub(crate) fn validate(ctx: &TransactionContext) -> Outcome {
    let read_point = ctx.read_point();
    for handle in ctx.validation_handles() {
        let current = handle.latest_write_point();
        if current > read_point {
            return Outcome::Conflict {
                ref_id: handle.id(),
                read_point,
                current,
            };
        }
    }
    Outcome::Clean
}
