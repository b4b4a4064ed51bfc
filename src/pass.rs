//! The allocator's single external entry point (§6): `create` binds a pass
//! to one [`Function`], `run` drives the collector (C4), the first-fit
//! allocator (C5), and the rewriter (C6) to completion over it.
//!
//! Grounded on the teacher's `regalloc::Context` (`cranelift_codegen`): a
//! small owning struct whose `run` method sequences the allocator's
//! sub-passes over a caller-owned `Function`, rather than free functions the
//! caller must remember to call in order.

use crate::collect::collect;
use crate::config::AllocatorConfig;
use crate::interval::IntervalStore;
use crate::ir::Function;
use crate::{allocate, rewrite};
use log::debug;

/// Binds one register-allocation run to a caller-owned [`Function`].
///
/// Per the crate's concurrency model (§5), a pass is single-threaded,
/// non-suspending, and strictly local to one `run()`: the interval store and
/// work queue it builds are not reused across functions. Callers that
/// allocate many functions should construct a fresh pass per function
/// (mirroring the teacher's `Context`, this crate does not expose a `clear`
/// because the pass itself holds no memory worth amortizing across runs at
/// this crate's scale — see `DESIGN.md`).
pub struct AllocateRegistersPass<'f> {
    func: &'f mut Function,
    config: AllocatorConfig,
}

impl<'f> AllocateRegistersPass<'f> {
    /// Bind a new pass to `function`, using the default allocator
    /// configuration (the full 0-7 GPR pool for unconstrained values).
    pub fn create(function: &'f mut Function) -> Self {
        Self::with_config(function, AllocatorConfig::default())
    }

    /// Bind a new pass to `function` with an explicit [`AllocatorConfig`],
    /// e.g. to narrow the generic register pool for deterministic
    /// register-exhaustion or move-cycle tests.
    pub fn with_config(function: &'f mut Function, config: AllocatorConfig) -> Self {
        Self { func: function, config }
    }

    /// Perform register allocation, mutating the bound function in place.
    ///
    /// On return, every mode-M/mode-R value reachable from the function
    /// carries a concrete register (property P3) and no `PseudoMoveSingle`
    /// or `PseudoMoveMultiple` instructions remain (property P5). Panics
    /// (this crate's only failure mode; see the top-level error-handling
    /// docs) if the collector encounters an unknown instruction/phi kind, if
    /// the allocator exhausts a compound's candidate registers, or if the
    /// rewriter cannot resolve a move cycle.
    pub fn run(mut self) {
        let mut store = IntervalStore::new();
        let queue = collect(self.func, &mut store, &self.config);
        debug!(
            "register allocation starting: {} block(s), {} compound(s) queued",
            self.func.block_count(),
            queue.len()
        );
        allocate::allocate(self.func, &mut store, &self.config, &queue);
        rewrite::rewrite(self.func, &mut store, &self.config);
        debug!("register allocation complete");
    }
}
