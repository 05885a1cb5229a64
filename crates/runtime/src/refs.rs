//! Versioned transactional refs
//!
//! A `Ref<T>` is a cloneable handle to a mutable cell whose published
//! values carry the write points of the commits that produced them. Ref
//! operations dispatch on the thread's active transaction: inside `run`
//! they stage work in the transaction's working set, outside `run` only
//! reads are permitted and return the latest head.
//!
//! Internally the cell is type-erased (`Arc<dyn Any + Send + Sync>`
//! payloads keyed by an integer ref id) so one transaction can span refs
//! of different value types; values are downcast back to `T` at this
//! typed surface, where a mismatch is unreachable by construction.

use crate::current;
use crate::transaction::CommuteOp;
use crate::world::World;
use mvstm_core::{Error, Result, VersionHistory, Versioned, WritePoint};
use parking_lot::RwLock;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased published value.
pub(crate) type DynValue = Arc<dyn Any + Send + Sync>;

/// Identity of a ref, unique within its world.
///
/// Assigned at construction; used as the working-set key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefId(pub(crate) u64);

impl RefId {
    /// Get the raw id value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Type-erased core of a ref: identity, owning world, and the bounded
/// version history. Histories are published only under the world's
/// commit lock; the read lock is held just long enough to clone out an
/// `Arc`, so out-of-transaction readers see either the old head or the
/// fully recorded new one.
pub(crate) struct RefHandle {
    id: RefId,
    world: Arc<World>,
    history: RwLock<VersionHistory<DynValue>>,
}

impl RefHandle {
    pub(crate) fn new(world: Arc<World>, initial: DynValue) -> Self {
        let id = world.allocate_ref_id();
        let head = Versioned::new(initial, world.current_write_point());
        let history = RwLock::new(VersionHistory::new(head, world.config().max_history));
        RefHandle { id, world, history }
    }

    pub(crate) fn id(&self) -> RefId {
        self.id
    }

    pub(crate) fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Clone the head value.
    pub(crate) fn latest_value(&self) -> DynValue {
        self.history.read().latest().value.clone()
    }

    /// Write point of the head entry.
    pub(crate) fn latest_write_point(&self) -> WritePoint {
        self.history.read().latest().write_point
    }

    /// Newest value visible at `read_point`, or `None` when the snapshot
    /// has aged out of the history window.
    pub(crate) fn visible_at(&self, read_point: WritePoint) -> Option<DynValue> {
        self.history
            .read()
            .visible_at(read_point)
            .map(|entry| entry.value.clone())
    }

    /// Record a newly committed value. Called only under the commit lock.
    pub(crate) fn publish(&self, value: DynValue, write_point: WritePoint) {
        self.history
            .write()
            .record(Versioned::new(value, write_point));
    }

    pub(crate) fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

/// Downcast a type-erased value back to its ref's value type.
///
/// Every value stored for a ref enters through `Ref<T>`'s typed surface,
/// so a mismatch here cannot occur.
pub(crate) fn downcast<T: Any + Clone>(value: &DynValue) -> T {
    match value.downcast_ref::<T>() {
        Some(v) => v.clone(),
        None => unreachable!("ref value has wrong type"),
    }
}

/// A mutable cell with versioned history, updated through transactions.
///
/// Handles are cheap to clone and share across threads; all clones refer
/// to the same cell.
///
/// # Example
///
/// ```
/// use mvstm_runtime::{run, Ref};
///
/// let counter = Ref::new(0i64);
/// run(|| counter.alter(|n| n + 1))?;
/// assert_eq!(counter.read()?, 1);
/// # mvstm_core::Result::Ok(())
/// ```
pub struct Ref<T> {
    handle: Arc<RefHandle>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Ref {
            handle: Arc::clone(&self.handle),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.handle.id().as_u64())
            .field("write_point", &self.handle.latest_write_point())
            .finish()
    }
}

impl<T: Any + Clone + Send + Sync> Ref<T> {
    /// Create a ref in the process-wide default world.
    ///
    /// The head entry carries the world's current write point.
    pub fn new(value: T) -> Self {
        Self::in_world(World::default_world(), value)
    }

    /// Create a ref in a specific world.
    pub fn in_world(world: &Arc<World>, value: T) -> Self {
        Ref {
            handle: Arc::new(RefHandle::new(Arc::clone(world), Arc::new(value))),
            _marker: PhantomData,
        }
    }

    /// Read the ref's value.
    ///
    /// Inside a transaction: returns the in-transaction value if this
    /// transaction already read, wrote, or commuted the ref; otherwise
    /// the newest published value visible at the transaction's read
    /// point, which is then cached. Fails with the retry signal when the
    /// snapshot has aged out of the ref's history window (the run loop
    /// restarts the attempt).
    ///
    /// Outside a transaction: returns the latest published value.
    pub fn read(&self) -> Result<T> {
        match current::with_active(|ctx| ctx.read(&self.handle)) {
            Some(result) => result.map(|value| downcast(&value)),
            None => Ok(downcast(&self.handle.latest_value())),
        }
    }

    /// Stage a write of `value` to this ref.
    ///
    /// The write becomes visible to other transactions only when the
    /// enclosing transaction commits. Fails with
    /// [`Error::WriteAfterCommute`] if the ref was already commuted in
    /// this transaction, and with [`Error::NotInTransaction`] outside a
    /// transaction.
    pub fn write(&self, value: T) -> Result<()> {
        let value: DynValue = Arc::new(value);
        match current::with_active(|ctx| ctx.write(&self.handle, value)) {
            Some(result) => result,
            None => Err(Error::NotInTransaction { op: "write" }),
        }
    }

    /// Read-modify-write: stage `f(current)` and return the staged value.
    ///
    /// Equivalent to a transactional read followed by a write, so it
    /// shares their failure modes.
    pub fn alter(&self, f: impl FnOnce(T) -> T) -> Result<T> {
        if !current::is_active() {
            return Err(Error::NotInTransaction { op: "alter" });
        }
        let new_value = f(self.read()?);
        self.write(new_value.clone())?;
        Ok(new_value)
    }

    /// Stage a commutative update and return its provisional result.
    ///
    /// The function is applied once now - to the in-transaction value if
    /// this transaction already touched the ref, else to the CURRENT
    /// head, deliberately not filtered by the read point - and again at
    /// commit time against the then-latest head, after validation and
    /// under the commit lock. Concurrent commute-only transactions on
    /// the same ref therefore never conflict, but the provisional value
    /// returned here is not snapshot-consistent; only the committed
    /// result is meaningful, and only for functions where application
    /// order does not matter.
    ///
    /// `f` may run more than once and must not stage further operations
    /// on this ref.
    pub fn commute(&self, f: impl Fn(T) -> T + Send + Sync + 'static) -> Result<T> {
        let base = match current::with_active(|ctx| ctx.commute_base(&self.handle)) {
            Some(result) => result?,
            None => return Err(Error::NotInTransaction { op: "commute" }),
        };
        let op: CommuteOp = Box::new(move |value: &DynValue| {
            let typed: T = downcast(value);
            Arc::new(f(typed)) as DynValue
        });
        // Applied outside the slot borrow: f is user code.
        let provisional = op(&base);
        match current::with_active(|ctx| ctx.stage_commute(&self.handle, provisional.clone(), op)) {
            Some(result) => result?,
            None => return Err(Error::NotInTransaction { op: "commute" }),
        }
        Ok(downcast(&provisional))
    }

    /// Protect this ref from concurrent writes without writing it.
    ///
    /// The commit validates ensured refs exactly like written ones: the
    /// transaction commits only if the ref's head write point has not
    /// advanced past the transaction's read point. This closes the
    /// write-skew window for refs a transaction bases decisions on but
    /// does not modify. Nothing is published for an ensured ref.
    pub fn ensure(&self) -> Result<()> {
        match current::with_active(|ctx| ctx.ensure(&self.handle)) {
            Some(result) => result,
            None => Err(Error::NotInTransaction { op: "ensure" }),
        }
    }

    /// Number of history entries currently retained.
    pub fn history_len(&self) -> usize {
        self.handle.history_len()
    }

    /// Write point of the most recently published value.
    pub fn latest_write_point(&self) -> WritePoint {
        self.handle.latest_write_point()
    }

    /// Get the type-erased handle (for in-crate tests).
    #[cfg(test)]
    pub(crate) fn handle(&self) -> &Arc<RefHandle> {
        &self.handle
    }
}
