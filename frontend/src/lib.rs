//! mem2reg: promotes stack locals to SSA values ahead of register allocation.
//!
//! Runs directly on a [`codegen::ir::Cfg`] built by some other front end (a parser, or in tests,
//! the IR builder directly); this crate has no lexer, parser, or type checker of its own.

pub mod ssa;

pub use ssa::promote_locals;
