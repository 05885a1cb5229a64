//! Per-thread active-transaction slot
//!
//! Ref operations consult this slot to decide whether transactional
//! semantics apply. The slot is installed by the run loop through a scope
//! guard, so it is cleared on every exit path - normal return, retry, a
//! failure propagating out, or a panic unwinding through the body.

use crate::transaction::TransactionContext;
use std::cell::RefCell;

thread_local! {
    static ACTIVE: RefCell<Option<TransactionContext>> = const { RefCell::new(None) };
}

/// Check whether this thread currently runs inside a transaction.
pub fn is_active() -> bool {
    ACTIVE.with(|slot| slot.borrow().is_some())
}

/// Run `f` against the active transaction, if any.
///
/// The slot's borrow is held only for the duration of `f`; callers must
/// not invoke user-supplied closures from inside `f`, so that a body
/// touching other refs never observes a held borrow.
pub(crate) fn with_active<R>(f: impl FnOnce(&mut TransactionContext) -> R) -> Option<R> {
    ACTIVE.with(|slot| slot.borrow_mut().as_mut().map(f))
}

/// Install `ctx` as this thread's active transaction.
///
/// The caller must have checked that no transaction is active. The
/// returned guard clears the slot when dropped.
pub(crate) fn enter(ctx: TransactionContext) -> ActiveTxGuard {
    ACTIVE.with(|slot| {
        let mut slot = slot.borrow_mut();
        debug_assert!(slot.is_none(), "transaction already active on this thread");
        *slot = Some(ctx);
    });
    ActiveTxGuard { _not_send: std::marker::PhantomData }
}

/// Scope guard for the active-transaction slot.
///
/// Dropping the guard clears the slot; `exit` takes the context back out
/// for commit. Both paths are idempotent, so panic unwinding and the
/// normal exit share one mechanism.
pub(crate) struct ActiveTxGuard {
    // The slot is thread-local; keep the guard on its thread.
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ActiveTxGuard {
    /// Take the context back out of the slot for commit.
    pub fn exit(self) -> TransactionContext {
        ACTIVE
            .with(|slot| slot.borrow_mut().take())
            .expect("active transaction slot emptied while guarded")
    }
}

impl Drop for ActiveTxGuard {
    fn drop(&mut self) {
        ACTIVE.with(|slot| {
            slot.borrow_mut().take();
        });
    }
}
