//! Register allocation core for a small x86-64 compiler back-end.
//!
//! This crate owns the hard part of a minimal native code generator: given a
//! function already expressed in a small SSA-style IR, assign every value a
//! concrete x86-64 register and rewrite away the pseudo-moves the allocator
//! itself introduces along the way. It does not build the IR from source,
//! select instructions, encode machine code, or drive a linker; callers hand
//! it a finished [`ir::Function`] and get one back with every value's
//! register slot filled in and every pseudo-move lowered to a real move.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

pub mod config;
pub mod entity;
pub mod error;
pub mod interval;
pub mod ir;
pub mod pc;

mod allocate;
mod collect;
mod pass;
mod rewrite;

pub use config::AllocatorConfig;
pub use error::IrBuildError;
pub use pass::AllocateRegistersPass;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
