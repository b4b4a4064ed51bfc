//! Crate-level configuration for the allocator pass.
//!
//! Mirrors, at a much smaller scale, the teacher lineage's
//! "construct a settings struct once, reuse it across runs" pattern (see
//! `cranelift_codegen`'s `Context`/`Flags`), without pulling in a full
//! ISA/settings framework that this crate's single fixed x86-64 register
//! file does not need.

/// The register file this crate allocates over is the low eight x86-64
/// GPRs: rax, rcx, rdx, rbx, rsp, rbp, rsi, rdi, at register numbers 0-7
/// respectively (the SysV ABI encoding used throughout this crate). ABI-
/// constrained values (call arguments beyond the fourth, `r8`/`r9`) reach
/// into registers 8 and 9, which is why masks are carried as `u16` rather
/// than `u8`.
pub const DEFAULT_ALLOCATABLE_MASK: u16 = 0x00ff;

/// Tunables read once when an [`crate::AllocateRegistersPass`] is created.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorConfig {
    /// Bitmask (bit `i` = register `i`) of registers the first-fit allocator
    /// may hand out to values with a generic (unconstrained) affinity.
    ///
    /// This does not narrow ABI-fixed slots (call argument registers, the
    /// call result register, argument-phi registers): those are hardware
    /// constraints, not a pool the allocator chooses from. It exists so
    /// tests can starve the allocator down to one or two free registers and
    /// exercise the register-exhaustion and move-cycle paths deterministically.
    pub generic_register_mask: u16,

    /// Gate the more verbose per-instruction `log::trace!` lines (register
    /// chosen, value affected, PC range) beyond the coarser `log::debug!`
    /// lines that are always emitted.
    pub trace: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            generic_register_mask: DEFAULT_ALLOCATABLE_MASK,
            trace: false,
        }
    }
}
