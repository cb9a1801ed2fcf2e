//! Named top-level globals.

use crate::ir::entities::{Const, Type};

/// Linkage for a global or function: whether it is visible to the linker outside this object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Linkage {
    Local,
    External,
}

/// A named, pointer-typed top-level value with an optional constant initializer.
#[derive(Clone, Debug)]
pub struct GlobalData {
    pub name: String,
    /// The type of the pointee (the global `Value` itself is pointer-typed to this).
    pub allocated_ty: Type,
    pub init: Option<Const>,
    pub linkage: Linkage,
    /// Whether this global's storage is immutable (`.rodata`) or writable (`.data`).
    pub read_only: bool,
}
