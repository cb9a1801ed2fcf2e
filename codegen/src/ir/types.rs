//! The type pool: interns every type that appears in a translation unit.
//!
//! Types are compared by identity after interning (reference equality implies semantic equality),
//! so `TypePool` hands out the same [`Type`] for two structurally identical
//! requests. Structs are special: they're declared by name first as a forward shell (so
//! self-referential and mutually-recursive struct types can exist) and populated with fields in a
//! second step.

use crate::ir::entities::Type;
use entity::PrimaryMap;
use std::collections::HashMap;

/// An interned type's payload. `Type` is the stable handle; `TypeData` is what it dereferences to
/// in the pool's arena.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    /// An integer of the given bit width (1, 8, 16, 32, or 64). Signedness is not part of the
    /// type; it is selected by the opcode that operates on values of this type.
    Integer { width: u8 },
    /// An IEEE-754 float of the given bit width (32 or 64).
    Float { width: u8 },
    /// A pointer to `pointee`. Always pointer-sized on the target regardless of `pointee`.
    Pointer { pointee: Type },
    /// A fixed-length array of `count` elements of type `element`.
    Array { element: Type, count: u64 },
    /// A named struct. Declared first as an empty shell via [`TypePool::declare_struct`], then
    /// populated via [`TypePool::define_struct`].
    Struct {
        name: String,
        fields: Vec<Type>,
    },
    /// A function type: argument types plus an optional return type.
    Function {
        params: Vec<Type>,
        ret: Option<Type>,
    },
}

/// The key structural types are interned under. Structs intern by name alone: two `declare_struct`
/// calls with the same name return the same shell, and only `define_struct` may set its fields.
#[derive(Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    Integer(u8),
    Float(u8),
    Pointer(Type),
    Array(Type, u64),
    Struct(String),
    Function(Vec<Type>, Option<Type>),
}

/// Interns every type reachable from a translation unit.
#[derive(Default)]
pub struct TypePool {
    arena: PrimaryMap<Type, TypeData>,
    interned: HashMap<TypeKey, Type>,
}

impl TypePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a type's data.
    pub fn data(&self, ty: Type) -> &TypeData {
        &self.arena[ty]
    }

    /// Intern an integer type of the given width. Widths other than 1/8/16/32/64 are a
    /// programmer error in the caller (the front end is responsible for only requesting the
    /// fixed widths the language defines).
    pub fn int(&mut self, width: u8) -> Type {
        debug_assert!(matches!(width, 1 | 8 | 16 | 32 | 64), "unsupported integer width {width}");
        self.intern(TypeKey::Integer(width), || TypeData::Integer { width })
    }

    /// Intern a float type of the given width (32 or 64).
    pub fn float(&mut self, width: u8) -> Type {
        debug_assert!(matches!(width, 32 | 64), "unsupported float width {width}");
        self.intern(TypeKey::Float(width), || TypeData::Float { width })
    }

    /// Intern a pointer type.
    pub fn pointer(&mut self, pointee: Type) -> Type {
        self.intern(TypeKey::Pointer(pointee), || TypeData::Pointer { pointee })
    }

    /// Intern an array type.
    pub fn array(&mut self, element: Type, count: u64) -> Type {
        self.intern(TypeKey::Array(element, count), || TypeData::Array { element, count })
    }

    /// Intern a function type.
    pub fn function(&mut self, params: Vec<Type>, ret: Option<Type>) -> Type {
        self.intern(TypeKey::Function(params.clone(), ret), || TypeData::Function { params, ret })
    }

    /// Declare a named struct, creating an empty shell if this name hasn't been seen before.
    /// Repeated calls with the same name return the existing shell (possibly already defined).
    pub fn declare_struct(&mut self, name: impl Into<String>) -> Type {
        let name = name.into();
        self.intern(TypeKey::Struct(name.clone()), || TypeData::Struct { name, fields: Vec::new() })
    }

    /// Populate a previously declared struct shell with its field types.
    ///
    /// Panics if `ty` does not refer to a struct previously returned by `declare_struct` (a
    /// broken invariant, not a user-facing error).
    pub fn define_struct(&mut self, ty: Type, fields: Vec<Type>) {
        match &mut self.arena[ty] {
            TypeData::Struct { fields: slot, .. } => *slot = fields,
            other => panic!("define_struct called on non-struct type: {other:?}"),
        }
    }

    fn intern(&mut self, key: TypeKey, make: impl FnOnce() -> TypeData) -> Type {
        if let Some(&ty) = self.interned.get(&key) {
            return ty;
        }
        let ty = self.arena.push(make());
        self.interned.insert(key, ty);
        ty
    }

    /// Is this an integer type?
    pub fn is_integer(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Integer { .. })
    }

    /// Is this a float type?
    pub fn is_float(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Float { .. })
    }

    /// Is this a pointer type?
    pub fn is_pointer(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Pointer { .. })
    }

    /// Is this a struct type?
    pub fn is_struct(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Struct { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_intern_by_width() {
        let mut pool = TypePool::new();
        let a = pool.int(64);
        let b = pool.int(64);
        let c = pool.int(32);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn pointers_intern_by_pointee() {
        let mut pool = TypePool::new();
        let i64 = pool.int(64);
        let i32 = pool.int(32);
        let p1 = pool.pointer(i64);
        let p2 = pool.pointer(i64);
        let p3 = pool.pointer(i32);
        assert_eq!(p1, p2);
        assert_ne!(p1, p3);
    }

    #[test]
    fn arrays_intern_by_element_and_count() {
        let mut pool = TypePool::new();
        let i8 = pool.int(8);
        let a1 = pool.array(i8, 16);
        let a2 = pool.array(i8, 16);
        let a3 = pool.array(i8, 32);
        assert_eq!(a1, a2);
        assert_ne!(a1, a3);
    }

    #[test]
    fn structs_intern_by_name_and_allow_forward_declaration() {
        let mut pool = TypePool::new();
        let shell = pool.declare_struct("Box");
        let same_shell = pool.declare_struct("Box");
        assert_eq!(shell, same_shell);

        let i64 = pool.int(64);
        pool.define_struct(shell, vec![i64, i64]);
        match pool.data(shell) {
            TypeData::Struct { name, fields } => {
                assert_eq!(name, "Box");
                assert_eq!(fields.len(), 2);
            }
            other => panic!("expected struct, got {other:?}"),
        }
    }
}
