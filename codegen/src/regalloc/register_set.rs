//! The pool of physical registers the allocator may hand out, per class.

use crate::isa::x86::registers::{allocatable_fp, PhysReg, RegClass, ALLOCATABLE_GP};

/// The assignable registers for each class on this target. Callee-saved registers
/// (`%rbx, %r12..%r15, %rsp, %rbp`) never appear here; they are reserved from allocation.
pub struct RegisterSet {
    gp: Vec<PhysReg>,
    fp: Vec<PhysReg>,
}

impl RegisterSet {
    pub fn for_target() -> Self {
        Self { gp: ALLOCATABLE_GP.to_vec(), fp: allocatable_fp() }
    }

    pub fn class(&self, class: RegClass) -> &[PhysReg] {
        match class {
            RegClass::GeneralPurpose => &self.gp,
            RegClass::FloatingPoint => &self.fp,
            RegClass::Vector => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_callee_saved_registers() {
        let set = RegisterSet::for_target();
        assert!(!set.class(RegClass::GeneralPurpose).contains(&PhysReg::Rbx));
        assert!(!set.class(RegClass::GeneralPurpose).contains(&PhysReg::Rbp));
        assert_eq!(set.class(RegClass::FloatingPoint).len(), 16);
    }
}
