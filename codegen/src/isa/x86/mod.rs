//! x86-64 SystemV instruction selection.

pub mod registers;
pub mod select;

pub use registers::{PhysReg, RegClass};
pub use select::select_function;
