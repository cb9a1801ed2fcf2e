//! The compilation target: x86-64 Linux under the SystemV ABI.
//!
//! Only one target triple is supported; `Target` still carries a `target_lexicon::Triple` (the
//! way every ISA backend in this corpus identifies its target) so the rest of the pipeline has a
//! real handle to log, assert against, and eventually branch on if a second target is ever added.

use crate::ir::{Type, TypeData, TypePool};
use std::str::FromStr;
use target_lexicon::Triple;

/// The calling convention in effect. Fixed to SystemV; kept as an enum (rather than inlined)
/// because every piece of code that asks "what convention" should ask the target, not assume.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallConv {
    SystemV,
}

/// Records the architecture/ABI/OS triple and answers every size/alignment/offset question the
/// rest of the pipeline needs.
#[derive(Clone, Debug)]
pub struct Target {
    pub triple: Triple,
    pub call_conv: CallConv,
}

impl Target {
    /// The only supported target: x86-64 Linux, SystemV ABI.
    pub fn x86_64_linux_systemv() -> Self {
        Self {
            triple: Triple::from_str("x86_64-unknown-linux-gnu")
                .expect("x86_64-unknown-linux-gnu is a valid target triple"),
            call_conv: CallConv::SystemV,
        }
    }

    /// Size in bytes of a value of type `ty`.
    pub fn size_of(&self, types: &TypePool, ty: Type) -> u64 {
        match types.data(ty) {
            TypeData::Integer { width } => int_storage_bytes(*width),
            TypeData::Float { width } => (*width as u64) / 8,
            TypeData::Pointer { .. } => 8,
            TypeData::Array { element, count } => self.size_of(types, *element) * count,
            TypeData::Struct { fields, .. } => {
                let mut offset = 0u64;
                for &field in fields {
                    let align = self.align_of(types, field);
                    offset = round_up(offset, align);
                    offset += self.size_of(types, field);
                }
                round_up(offset, self.align_of(types, ty))
            }
            TypeData::Function { .. } => 8, // function values are always addresses
        }
    }

    /// Size in bits of a value of type `ty`.
    pub fn size_of_in_bits(&self, types: &TypePool, ty: Type) -> u64 {
        match types.data(ty) {
            TypeData::Integer { width } => *width as u64,
            _ => self.size_of(types, ty) * 8,
        }
    }

    /// Natural alignment in bytes of a value of type `ty`.
    pub fn align_of(&self, types: &TypePool, ty: Type) -> u64 {
        match types.data(ty) {
            TypeData::Integer { width } => int_storage_bytes(*width),
            TypeData::Float { width } => (*width as u64) / 8,
            TypeData::Pointer { .. } | TypeData::Function { .. } => 8,
            TypeData::Array { element, .. } => self.align_of(types, *element),
            TypeData::Struct { fields, .. } => fields
                .iter()
                .map(|&f| self.align_of(types, f))
                .max()
                .unwrap_or(1),
        }
    }

    /// Byte offset of `struct_ty`'s field at `index`, accumulating rounded-up sizes by each
    /// preceding field's alignment.
    pub fn field_offset(&self, types: &TypePool, struct_ty: Type, index: usize) -> u64 {
        let fields = match types.data(struct_ty) {
            TypeData::Struct { fields, .. } => fields,
            other => panic!("field_offset called on non-struct type: {other:?}"),
        };
        let mut offset = 0u64;
        for &field in &fields[..index] {
            let align = self.align_of(types, field);
            offset = round_up(offset, align);
            offset += self.size_of(types, field);
        }
        let align = self.align_of(types, fields[index]);
        round_up(offset, align)
    }
}

/// Integer widths round up to a whole byte of storage; an `i1` occupies 1 byte but compares as a
/// 1-bit value logically.
fn int_storage_bytes(width: u8) -> u64 {
    ((width as u64) + 7) / 8
}

fn round_up(value: u64, align: u64) -> u64 {
    if align == 0 {
        value
    } else {
        (value + align - 1) / align * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_pointer_sizes() {
        let target = Target::x86_64_linux_systemv();
        let mut types = TypePool::new();
        let i64 = types.int(64);
        let i8 = types.int(8);
        let i1 = types.int(1);
        let ptr = types.pointer(i64);
        assert_eq!(target.size_of(&types, i64), 8);
        assert_eq!(target.size_of(&types, i8), 1);
        assert_eq!(target.size_of(&types, i1), 1);
        assert_eq!(target.size_of(&types, ptr), 8);
    }

    #[test]
    fn struct_field_offsets_respect_alignment() {
        let target = Target::x86_64_linux_systemv();
        let mut types = TypePool::new();
        let i8 = types.int(8);
        let i64 = types.int(64);
        let s = types.declare_struct("Mixed");
        types.define_struct(s, vec![i8, i64]);
        assert_eq!(target.field_offset(&types, s, 0), 0);
        assert_eq!(target.field_offset(&types, s, 1), 8);
        assert_eq!(target.size_of(&types, s), 16);
    }
}
