//! Per-attempt transaction working set
//!
//! A `TransactionContext` tracks everything one attempt of a transaction
//! body has done: the snapshot read point, the in-transaction value for
//! every ref touched, how each ref was touched (read, written, or
//! commuted), and the set of ensured refs. Validation and publication
//! happen at commit; until then nothing is visible to other threads.
//!
//! The working set is keyed by integer ref ids and stores type-erased
//! values, letting one transaction span refs of different value types.

use crate::refs::{DynValue, RefHandle, RefId};
use crate::world::World;
use mvstm_core::{Error, Result, WritePoint};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A staged commutative update, erased over the ref's value type.
///
/// Chains are kept in application (oldest-first) order and re-applied at
/// commit against the then-latest head.
pub(crate) type CommuteOp = Box<dyn Fn(&DynValue) -> DynValue>;

/// How a transaction has touched a ref.
///
/// State transitions:
/// - `ReadCached` → `Written` (write/alter)
/// - `ReadCached` → `Commuted` (commute)
/// - `Written` stays `Written` (a later commute folds into the staged
///   value, keeping the ref in the validated set)
/// - `Commuted` → write is fatal (`WriteAfterCommute`)
pub(crate) enum EntryState {
    /// Snapshot value cached by a read; not validated at commit.
    ReadCached,
    /// Explicitly written (or altered); validated and published.
    Written,
    /// Commuted only; exempt from validation, re-applied and published.
    Commuted(Vec<CommuteOp>),
}

/// One ref's slot in the working set.
pub(crate) struct TxEntry {
    /// Handle to the ref, for validation and publication.
    pub handle: Arc<RefHandle>,
    /// The value this transaction would publish (or has cached).
    pub value: DynValue,
    /// How the ref was touched.
    pub state: EntryState,
}

impl TxEntry {
    fn is_written(&self) -> bool {
        matches!(self.state, EntryState::Written)
    }

    fn publishes(&self) -> bool {
        matches!(self.state, EntryState::Written | EntryState::Commuted(_))
    }
}

/// Working set and metadata for a single transaction attempt.
///
/// Created by the run loop, mutated only from the owning thread, and
/// destroyed on commit or retry.
pub struct TransactionContext {
    world: Arc<World>,
    read_point: WritePoint,
    entries: FxHashMap<RefId, TxEntry>,
    ensured: FxHashMap<RefId, Arc<RefHandle>>,
}

impl TransactionContext {
    /// Create a fresh context snapshotting the world's write point.
    pub(crate) fn new(world: Arc<World>) -> Self {
        let read_point = world.current_write_point();
        TransactionContext {
            world,
            read_point,
            entries: FxHashMap::default(),
            ensured: FxHashMap::default(),
        }
    }

    /// The snapshot read point captured at creation.
    pub fn read_point(&self) -> WritePoint {
        self.read_point
    }

    /// A read-only attempt has cached reads at most: nothing to
    /// validate, nothing to publish, so commit is a no-op without the
    /// lock.
    pub fn is_read_only(&self) -> bool {
        self.ensured.is_empty() && self.entries.values().all(|e| matches!(e.state, EntryState::ReadCached))
    }

    /// Number of refs staged for publication.
    pub fn write_count(&self) -> usize {
        self.entries.values().filter(|e| e.publishes()).count()
    }

    /// Number of ensured refs.
    pub fn ensure_count(&self) -> usize {
        self.ensured.len()
    }

    fn check_world(&self, handle: &RefHandle) -> Result<()> {
        if Arc::ptr_eq(&self.world, handle.world()) {
            Ok(())
        } else {
            Err(Error::WorldMismatch)
        }
    }

    // === Body-side operations ===

    /// Transactional read: in-transaction value if present, else the
    /// newest published value at or below the read point (cached for
    /// repeatable reads). The retry signal means the snapshot has aged
    /// out of the ref's history window.
    pub(crate) fn read(&mut self, handle: &Arc<RefHandle>) -> Result<DynValue> {
        self.check_world(handle)?;
        if let Some(entry) = self.entries.get(&handle.id()) {
            return Ok(entry.value.clone());
        }
        match handle.visible_at(self.read_point) {
            Some(value) => {
                self.entries.insert(
                    handle.id(),
                    TxEntry {
                        handle: Arc::clone(handle),
                        value: value.clone(),
                        state: EntryState::ReadCached,
                    },
                );
                Ok(value)
            }
            None => Err(Error::RetryNeeded),
        }
    }

    /// Stage a write. Fatal if the ref was commuted in this transaction.
    pub(crate) fn write(&mut self, handle: &Arc<RefHandle>, value: DynValue) -> Result<()> {
        self.check_world(handle)?;
        match self.entries.get_mut(&handle.id()) {
            Some(entry) => {
                if matches!(entry.state, EntryState::Commuted(_)) {
                    return Err(Error::WriteAfterCommute);
                }
                entry.value = value;
                entry.state = EntryState::Written;
            }
            None => {
                self.entries.insert(
                    handle.id(),
                    TxEntry {
                        handle: Arc::clone(handle),
                        value,
                        state: EntryState::Written,
                    },
                );
            }
        }
        Ok(())
    }

    /// The base value a commute function is first applied to: the
    /// in-transaction value if the ref was already touched, else the
    /// CURRENT head - deliberately not filtered by the read point, so
    /// commutes compose and never force a retry on read.
    pub(crate) fn commute_base(&mut self, handle: &Arc<RefHandle>) -> Result<DynValue> {
        self.check_world(handle)?;
        match self.entries.get(&handle.id()) {
            Some(entry) => Ok(entry.value.clone()),
            None => Ok(handle.latest_value()),
        }
    }

    /// Stage a commute whose provisional value was already computed by
    /// the caller (user code runs outside the slot borrow).
    ///
    /// On a `Written` entry the function has been folded into the staged
    /// value and is dropped: the ref stays in the validated set and the
    /// re-apply set stays disjoint from the written set.
    pub(crate) fn stage_commute(
        &mut self,
        handle: &Arc<RefHandle>,
        provisional: DynValue,
        op: CommuteOp,
    ) -> Result<()> {
        self.check_world(handle)?;
        match self.entries.get_mut(&handle.id()) {
            Some(entry) => {
                entry.value = provisional;
                match &mut entry.state {
                    EntryState::ReadCached => entry.state = EntryState::Commuted(vec![op]),
                    EntryState::Written => {}
                    EntryState::Commuted(ops) => ops.push(op),
                }
            }
            None => {
                self.entries.insert(
                    handle.id(),
                    TxEntry {
                        handle: Arc::clone(handle),
                        value: provisional,
                        state: EntryState::Commuted(vec![op]),
                    },
                );
            }
        }
        Ok(())
    }

    /// Mark a ref ensured. Does not touch the in-transaction value.
    pub(crate) fn ensure(&mut self, handle: &Arc<RefHandle>) -> Result<()> {
        self.check_world(handle)?;
        self.ensured
            .entry(handle.id())
            .or_insert_with(|| Arc::clone(handle));
        Ok(())
    }

    // === Commit-side operations (called under the commit lock) ===

    /// Refs that must pass validation: every written ref, plus every
    /// ensured ref not already covered by a write.
    pub(crate) fn validation_handles(&self) -> impl Iterator<Item = &Arc<RefHandle>> {
        let written = self
            .entries
            .values()
            .filter(|e| e.is_written())
            .map(|e| &e.handle);
        let ensured_only = self
            .ensured
            .iter()
            .filter(|&(id, _)| {
                !self
                    .entries
                    .get(id)
                    .map(TxEntry::is_written)
                    .unwrap_or(false)
            })
            .map(|(_, handle)| handle);
        written.chain(ensured_only)
    }

    /// Re-derive every commuted ref's value by folding its chain, oldest
    /// first, over the then-latest head. Written refs are untouched;
    /// they publish their staged value after validation.
    pub(crate) fn reapply_commutes(&mut self) {
        for entry in self.entries.values_mut() {
            if let EntryState::Commuted(ops) = &entry.state {
                let mut value = entry.handle.latest_value();
                for op in ops {
                    value = op(&value);
                }
                entry.value = value;
            }
        }
    }

    /// Entries to publish: written and commuted refs.
    pub(crate) fn publishable_entries(&self) -> impl Iterator<Item = &TxEntry> {
        self.entries.values().filter(|e| e.publishes())
    }
}
