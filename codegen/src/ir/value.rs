//! The value/user/use graph: every IR entity that can be an operand derives from `Value`.
//!
//! A [`Value`] is the thing operands point at. Every value variant here maps to one of the
//! categories named in the data model: constants, globals, locals, arguments, basic blocks
//! (referenced as branch/jump operands), functions (referenced as call callees), instruction
//! results, and inline-asm blobs. Only instructions hold ordered operand lists (they are the
//! sole "User" kind), so the use-list lives here but is populated by
//! [`Function`](crate::ir::Function) as instructions are built and rewritten.

use crate::ir::entities::{Argument, Block, Const, Func, Global, InlineAsm, Inst, Local, Type, Value};
use entity::SecondaryMap;

/// What a [`Value`] actually is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueData {
    Constant(Const),
    Global(Global),
    Local(Local),
    Argument(Argument),
    Block(Block),
    Function(Func),
    /// The result produced by an instruction. Void-typed (effect-only) instructions never get a
    /// `Value`; see `Function::inst_result`.
    Inst(Inst),
    InlineAsm(InlineAsm),
}

/// Arena plus def-use side tables for every [`Value`] in a function.
///
/// Kept separate from [`Function`](crate::ir::Function) so the builder and the SSA pass can share
/// a small, focused type; `Function` composes one of these per function.
#[derive(Default)]
pub struct ValueGraph {
    arena: entity::PrimaryMap<Value, ValueData>,
    types: SecondaryMap<Value, Option<Type>>,
    /// Every instruction using a value, one entry per occupied operand slot (duplicates allowed
    /// when an instruction uses the same value in more than one slot).
    uses: SecondaryMap<Value, Vec<Inst>>,
}

impl ValueGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self, v: Value) -> ValueData {
        self.arena[v]
    }

    pub fn ty(&self, v: Value) -> Option<Type> {
        self.types[v]
    }

    /// Allocate a new value entry of the given kind and type.
    pub fn make(&mut self, data: ValueData, ty: Option<Type>) -> Value {
        let v = self.arena.push(data);
        self.types[v] = ty;
        v
    }

    /// Record that `user` consumes `operand` in one operand slot.
    pub fn add_use(&mut self, operand: Value, user: Inst) {
        self.uses[operand].push(user);
    }

    /// Remove one occurrence of `user` from `operand`'s use list (the caller guarantees the
    /// instruction actually used the value; this only drops one slot's worth of bookkeeping).
    pub fn remove_use(&mut self, operand: Value, user: Inst) {
        if let Some(pos) = self.uses[operand].iter().position(|&i| i == user) {
            self.uses[operand].swap_remove(pos);
        }
    }

    /// All distinct instructions using `v`, without duplicates even if an instruction uses `v`
    /// in more than one operand slot.
    pub fn users(&self, v: Value) -> Vec<Inst> {
        let mut users = self.uses[v].clone();
        users.sort_unstable();
        users.dedup();
        users
    }

    /// Number of operand slots across all users referencing `v` (not the number of distinct
    /// users — an instruction using `v` twice counts twice).
    pub fn use_count(&self, v: Value) -> usize {
        self.uses[v].len()
    }

    pub fn has_no_uses(&self, v: Value) -> bool {
        self.uses[v].is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::entities::Local;
    use entity::EntityRef;

    #[test]
    fn tracks_use_counts_and_dedups_users() {
        let mut g = ValueGraph::new();
        let local = g.make(ValueData::Local(Local::new(0)), None);
        let user = Inst::new(0);
        g.add_use(local, user);
        g.add_use(local, user);
        assert_eq!(g.use_count(local), 2);
        assert_eq!(g.users(local), vec![user]);

        g.remove_use(local, user);
        assert_eq!(g.use_count(local), 1);
        assert!(!g.has_no_uses(local));
        g.remove_use(local, user);
        assert!(g.has_no_uses(local));
    }
}
