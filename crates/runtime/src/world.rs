//! Transactional worlds and the commit driver
//!
//! A `World` is one STM universe: the global write-point counter, the
//! commit lock, the ref-id allocator, and the configuration its refs are
//! built with. Most programs use the process-wide default world through
//! [`run`] and `Ref::new`; independent worlds exist so tests (or embedded
//! uses) can run isolated universes in one process.
//!
//! ## Commit sequence
//!
//! ```text
//! 1. Read-only fast path - no lock, no write-point bump
//! 2. Acquire the commit lock (serializes all committers)
//! 3. Validate written + ensured refs against head write points
//!    IF any moved past the read point: release and signal retry
//! 4. Re-apply commute chains of non-written refs to the latest heads
//! 5. Publish all written/commuted values at write point GWP + 1
//! 6. Bump the global write point (release store)
//! 7. Release the lock
//! ```
//!
//! Publishing every head before the bump means a transaction that
//! snapshots the post-bump write point always finds fully recorded
//! entries at or below its read point. An ensure-only transaction stops
//! after step 3: validated, nothing published, no bump.

use crate::current;
use crate::refs::{Ref, RefId};
use crate::transaction::TransactionContext;
use crate::validation::{validate, Outcome};
use mvstm_core::{Config, Error, Result, WritePoint};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static DEFAULT_WORLD: Lazy<Arc<World>> = Lazy::new(|| World::new(Config::default()));

/// One STM universe: write-point counter, commit lock, configuration.
///
/// # Thread Safety
///
/// Commits are serialized by the single commit lock; the lock is held
/// across validate-then-publish so no other committer can move a head
/// between the check and the write. Ref histories and the write point
/// are mutated only while it is held. One lock, acquired in one place,
/// released before user code resumes: deadlock-free by construction.
pub struct World {
    /// Global write point. Bumped by one per publishing commit.
    write_point: AtomicU64,

    /// Serializes every publishing or ensuring commit.
    commit_lock: Mutex<()>,

    /// Ref identity allocator.
    next_ref_id: AtomicU64,

    /// Configuration refs in this world are built with.
    config: Config,
}

impl World {
    /// Create a world with the given configuration.
    pub fn new(config: Config) -> Arc<World> {
        Arc::new(World {
            write_point: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            next_ref_id: AtomicU64::new(0),
            config,
        })
    }

    /// The process-wide default world used by `Ref::new` and [`run`].
    pub fn default_world() -> &'static Arc<World> {
        &DEFAULT_WORLD
    }

    /// This world's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current global write point.
    ///
    /// Acquire ordering pairs with the release store in commit: a
    /// transaction that snapshots this value finds every head at or
    /// below it fully published.
    pub fn current_write_point(&self) -> WritePoint {
        WritePoint::new(self.write_point.load(Ordering::Acquire))
    }

    /// Allocate a ref identity.
    ///
    /// # Panics
    ///
    /// Panics if the id counter reaches `u64::MAX` (overflow).
    pub(crate) fn allocate_ref_id(&self) -> RefId {
        let id = self
            .next_ref_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
            .expect("ref id overflow: u64::MAX reached");
        RefId(id)
    }

    /// Create a ref in this world.
    pub fn new_ref<T: Any + Clone + Send + Sync>(self: &Arc<Self>, value: T) -> Ref<T> {
        Ref::in_world(self, value)
    }

    /// Run `body` as a transaction against this world.
    ///
    /// With a transaction already active on this thread the body is
    /// inlined into it: it executes directly against the enclosing
    /// working set and no sub-commit happens. Otherwise the loop below
    /// drives the body to a successful commit:
    ///
    /// - a retry signal from the body or from commit validation discards
    ///   the attempt and starts over with a fresh read point;
    /// - any other error propagates to the caller with nothing
    ///   published;
    /// - a normal return commits and yields the body's value.
    ///
    /// There is no bounded retry count; under perpetual conflict the
    /// loop runs forever (some committer always makes progress per
    /// commit window, just not necessarily this one). Bodies can run
    /// many times and should not perform side effects beyond ref
    /// operations.
    pub fn run<T>(self: &Arc<Self>, mut body: impl FnMut() -> Result<T>) -> Result<T> {
        if current::is_active() {
            return body();
        }
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let guard = current::enter(TransactionContext::new(Arc::clone(self)));
            let outcome = body();
            let ctx = guard.exit();
            match outcome {
                Ok(value) => match self.commit(ctx) {
                    Ok(()) => return Ok(value),
                    Err(e) if e.is_retry() => {
                        tracing::trace!(attempt, "commit conflict, retrying transaction");
                    }
                    Err(e) => return Err(e),
                },
                Err(e) if e.is_retry() => {
                    tracing::trace!(attempt, "snapshot too old, retrying transaction");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Validate and publish one attempt's working set.
    ///
    /// Only the retry signal is ever returned; every other failure mode
    /// is caught before commit.
    fn commit(&self, mut ctx: TransactionContext) -> Result<()> {
        if ctx.is_read_only() {
            return Ok(());
        }
        let _guard = self.commit_lock.lock();

        if let Outcome::Conflict {
            ref_id,
            read_point,
            current,
        } = validate(&ctx)
        {
            tracing::trace!(
                ref_id = ref_id.as_u64(),
                read_point = read_point.as_u64(),
                current = current.as_u64(),
                "validation conflict"
            );
            return Err(Error::RetryNeeded);
        }

        ctx.reapply_commutes();

        // Ensure-only: validated, but nothing to publish and no bump.
        if ctx.publishable_entries().next().is_none() {
            return Ok(());
        }

        let new_write_point = self.current_write_point().next();
        let mut published = 0usize;
        for entry in ctx.publishable_entries() {
            entry.handle.publish(entry.value.clone(), new_write_point);
            published += 1;
        }
        self.write_point
            .store(new_write_point.as_u64(), Ordering::Release);

        tracing::debug!(
            write_point = new_write_point.as_u64(),
            refs = published,
            "transaction committed"
        );
        Ok(())
    }
}

/// Run `body` as a transaction against the default world.
///
/// See [`World::run`] for the retry semantics.
pub fn run<T>(body: impl FnMut() -> Result<T>) -> Result<T> {
    World::default_world().run(body)
}
