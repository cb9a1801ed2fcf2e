//! Entity references used throughout the IR.
//!
//! Every addressable thing in the IR — a value, an instruction, a block, a type, a constant, a
//! global, a function, a local, an inline-asm blob — is a 32-bit index into an arena owned by the
//! [`Cfg`](crate::ir::Cfg) (or, for instructions and blocks, by the owning
//! [`Function`](crate::ir::Function)). None of these are Rust references: that would make the
//! graph-shaped, frequently-rewritten IR fight the borrow checker at every turn. Instead each
//! entity is `Copy`, each arena is a flat `PrimaryMap`, and side tables are `SecondaryMap`s keyed
//! by the entity.

use core::fmt;
use entity::entity_impl;

/// A reference to an IR value: the result of an instruction, a constant, a global, a local, a
/// function argument, a basic block (used as a branch/jump operand), a function (used as a call
/// callee), or an inline-asm blob. This is the unit the def-use graph operates on.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(u32);
entity_impl!(Value, "v");

/// A reference to an instruction within a function's instruction arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A reference to a basic block within a function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A reference to an interned type.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(u32);
entity_impl!(Type, "t");

/// A reference to an interned constant.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Const(u32);
entity_impl!(Const, "c");

/// A reference to a named top-level global.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Global(u32);
entity_impl!(Global, "g");

/// A reference to a function within the CFG.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Func(u32);
entity_impl!(Func, "fn");

/// A reference to a stack-allocated local within a function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Local(u32);
entity_impl!(Local, "local");

/// A reference to a function argument (a numbered parameter).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Argument(u32);
entity_impl!(Argument, "arg");

/// A reference to an inline-assembly blob.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InlineAsm(u32);
entity_impl!(InlineAsm, "asm");

/// Any one of the entity references above, for diagnostics that name "the thing that broke"
/// without committing to a single entity kind.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum AnyEntity {
    Value(Value),
    Inst(Inst),
    Block(Block),
    Type(Type),
    Const(Const),
    Global(Global),
    Func(Func),
    Local(Local),
    Argument(Argument),
}

impl fmt::Display for AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AnyEntity::Value(r) => r.fmt(f),
            AnyEntity::Inst(r) => r.fmt(f),
            AnyEntity::Block(r) => r.fmt(f),
            AnyEntity::Type(r) => r.fmt(f),
            AnyEntity::Const(r) => r.fmt(f),
            AnyEntity::Global(r) => r.fmt(f),
            AnyEntity::Func(r) => r.fmt(f),
            AnyEntity::Local(r) => r.fmt(f),
            AnyEntity::Argument(r) => r.fmt(f),
        }
    }
}

impl fmt::Debug for AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

macro_rules! any_entity_from {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for AnyEntity {
            fn from(r: $ty) -> Self {
                AnyEntity::$variant(r)
            }
        }
    };
}

any_entity_from!(Value, Value);
any_entity_from!(Inst, Inst);
any_entity_from!(Block, Block);
any_entity_from!(Type, Type);
any_entity_from!(Const, Const);
any_entity_from!(Global, Global);
any_entity_from!(Func, Func);
any_entity_from!(Local, Local);
any_entity_from!(Argument, Argument);

#[cfg(test)]
mod tests {
    use super::*;
    use entity::EntityRef;

    #[test]
    fn display_matches_prefix() {
        assert_eq!(Value::new(3).to_string(), "v3");
        assert_eq!(Block::new(1).to_string(), "block1");
        assert_eq!(Local::new(0).to_string(), "local0");
    }
}
