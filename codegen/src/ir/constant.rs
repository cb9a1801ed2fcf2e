//! The constant pool: interns integer, float, null, block-address, and string constants by value.

use crate::ir::entities::{Block, Const, Type};
use entity::PrimaryMap;
use std::collections::HashMap;

/// An interned constant's payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantData {
    /// An integer constant of a given type and bit pattern (sign-agnostic; the opcode consuming
    /// it decides how to interpret the bits).
    Int { ty: Type, bits: u64 },
    /// A float constant, keyed by its raw bit pattern so `0.0` and `-0.0` intern separately.
    Float { ty: Type, bits: u64 },
    /// The null pointer constant of a given pointer type.
    Null { ty: Type },
    /// The address of a basic block, used only as a jump/branch operand.
    BlockAddress { block: Block },
    /// A string constant, materialized as a global string in the constant pool at selection time.
    String { bytes: Vec<u8> },
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Int(Type, u64),
    Float(Type, u64),
    Null(Type),
    BlockAddress(Block),
    String(Vec<u8>),
}

/// Interns every constant reachable from a translation unit, by value.
#[derive(Default)]
pub struct ConstantPool {
    arena: PrimaryMap<Const, ConstantData>,
    interned: HashMap<ConstKey, Const>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self, c: Const) -> &ConstantData {
        &self.arena[c]
    }

    /// Intern an integer constant. `bits` holds the two's-complement/unsigned bit pattern
    /// truncated to the type's width.
    pub fn int(&mut self, ty: Type, bits: u64) -> Const {
        self.intern(ConstKey::Int(ty, bits), || ConstantData::Int { ty, bits })
    }

    /// The distinguished one-bit `true` constant.
    pub fn true_(&mut self, i1: Type) -> Const {
        self.int(i1, 1)
    }

    /// The distinguished one-bit `false` constant.
    pub fn false_(&mut self, i1: Type) -> Const {
        self.int(i1, 0)
    }

    /// Intern a float constant by its raw IEEE-754 bit pattern.
    pub fn float(&mut self, ty: Type, bits: u64) -> Const {
        self.intern(ConstKey::Float(ty, bits), || ConstantData::Float { ty, bits })
    }

    /// Intern `f64` as its bit pattern (zero-extended into the key space for `f32` values too,
    /// since callers store the already-narrowed bits).
    pub fn float_f64(&mut self, ty: Type, value: f64) -> Const {
        self.float(ty, value.to_bits())
    }

    /// Intern the null constant of a pointer type.
    pub fn null(&mut self, ty: Type) -> Const {
        self.intern(ConstKey::Null(ty), || ConstantData::Null { ty })
    }

    /// Intern a block-address constant, used as a jump/branch operand.
    pub fn block_address(&mut self, block: Block) -> Const {
        self.intern(ConstKey::BlockAddress(block), || ConstantData::BlockAddress { block })
    }

    /// Intern a string constant by its exact byte content.
    pub fn string(&mut self, bytes: impl Into<Vec<u8>>) -> Const {
        let bytes = bytes.into();
        self.intern(ConstKey::String(bytes.clone()), || ConstantData::String { bytes })
    }

    fn intern(&mut self, key: ConstKey, make: impl FnOnce() -> ConstantData) -> Const {
        if let Some(&c) = self.interned.get(&key) {
            return c;
        }
        let c = self.arena.push(make());
        self.interned.insert(key, c);
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::TypePool;

    #[test]
    fn integers_intern_by_type_and_value() {
        let mut types = TypePool::new();
        let mut consts = ConstantPool::new();
        let i64 = types.int(64);
        let i32 = types.int(32);
        let a = consts.int(i64, 42);
        let b = consts.int(i64, 42);
        let c = consts.int(i32, 42);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn positive_and_negative_zero_float_are_distinct() {
        let mut types = TypePool::new();
        let mut consts = ConstantPool::new();
        let f64 = types.float(64);
        let pos = consts.float_f64(f64, 0.0);
        let neg = consts.float_f64(f64, -0.0);
        assert_ne!(pos, neg);
    }

    #[test]
    fn null_is_distinct_per_pointee() {
        let mut types = TypePool::new();
        let mut consts = ConstantPool::new();
        let i64 = types.int(64);
        let i32 = types.int(32);
        let p_i64 = types.pointer(i64);
        let p_i32 = types.pointer(i32);
        let n1 = consts.null(p_i64);
        let n2 = consts.null(p_i32);
        assert_ne!(n1, n2);
    }

    #[test]
    fn strings_intern_by_exact_bytes() {
        let mut consts = ConstantPool::new();
        let a = consts.string("hello");
        let b = consts.string("hello");
        let c = consts.string("hellp");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
