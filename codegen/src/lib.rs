//! The crucible compiler's middle and back end: a typed SSA IR, instruction selection for
//! x86-64, a linear-scan register allocator, and a SystemV assembly emitter.
//!
//! This crate has no knowledge of source syntax, name resolution, or type checking; it consumes
//! an already-built [`ir::Cfg`] (the front end's job is to populate one via [`ir::InstBuilder`])
//! and produces text assembly.

pub mod binemit;
pub mod dce;
pub mod ir;
pub mod isa;
pub mod regalloc;
pub mod result;
pub mod target;

pub use result::{CodegenError, CodegenResult};
