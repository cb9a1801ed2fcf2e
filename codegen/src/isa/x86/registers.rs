//! x86-64 physical registers and register classes.

use core::fmt;

/// The class of register a virtual register wants. `Vector` is carried for fidelity with the
/// machine-register model but never actually requested: this target has no vector-typed IR
/// values, so no virtual register is ever created in that class.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegClass {
    GeneralPurpose,
    FloatingPoint,
    Vector,
}

/// A physical x86-64 general-purpose or SSE register.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PhysReg {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Xmm(u8),
}

/// General-purpose registers available to the allocator, in assignment-preference order. `%rbx`,
/// `%r12..%r15`, `%rsp`, and `%rbp` are callee-saved and reserved from allocation in this first
/// implementation pass.
pub const ALLOCATABLE_GP: &[PhysReg] = &[
    PhysReg::Rax,
    PhysReg::Rcx,
    PhysReg::Rdx,
    PhysReg::Rsi,
    PhysReg::Rdi,
    PhysReg::R8,
    PhysReg::R9,
    PhysReg::R10,
    PhysReg::R11,
];

/// Floating-point registers available to the allocator: every `%xmm` register participates,
/// there is no callee-saved SSE register on SystemV.
pub fn allocatable_fp() -> Vec<PhysReg> {
    (0..16).map(PhysReg::Xmm).collect()
}

/// SystemV argument-passing order for integer/pointer arguments.
pub const SYSV_INT_ARG_REGS: &[PhysReg] = &[
    PhysReg::Rdi,
    PhysReg::Rsi,
    PhysReg::Rdx,
    PhysReg::Rcx,
    PhysReg::R8,
    PhysReg::R9,
];

/// SystemV argument-passing order for float arguments.
pub fn sysv_float_arg_regs() -> Vec<PhysReg> {
    (0..6).map(PhysReg::Xmm).collect()
}

pub const RETURN_INT: PhysReg = PhysReg::Rax;
pub const RETURN_FLOAT: PhysReg = PhysReg::Xmm(0);
/// Scratch register reserved for memory-to-memory move staging; excluded from allocation.
pub const SCRATCH: PhysReg = PhysReg::Rax;

impl PhysReg {
    pub fn class(self) -> RegClass {
        match self {
            PhysReg::Xmm(_) => RegClass::FloatingPoint,
            _ => RegClass::GeneralPurpose,
        }
    }

    /// The raw index `MachineRegister::physical` indexes by: general-purpose registers 0-15 in
    /// declaration order above, `Xmm(n)` following at `16 + n`.
    pub fn raw_index(self) -> u32 {
        use PhysReg::*;
        match self {
            Rax => 0,
            Rcx => 1,
            Rdx => 2,
            Rbx => 3,
            Rsp => 4,
            Rbp => 5,
            Rsi => 6,
            Rdi => 7,
            R8 => 8,
            R9 => 9,
            R10 => 10,
            R11 => 11,
            R12 => 12,
            R13 => 13,
            R14 => 14,
            R15 => 15,
            Xmm(n) => 16 + n as u32,
        }
    }

    /// The inverse of [`Self::raw_index`].
    pub fn from_raw_index(index: u32) -> PhysReg {
        use PhysReg::*;
        match index {
            0 => Rax,
            1 => Rcx,
            2 => Rdx,
            3 => Rbx,
            4 => Rsp,
            5 => Rbp,
            6 => Rsi,
            7 => Rdi,
            8 => R8,
            9 => R9,
            10 => R10,
            11 => R11,
            12 => R12,
            13 => R13,
            14 => R14,
            15 => R15,
            n if n < 32 => Xmm((n - 16) as u8),
            other => panic!("raw register index {other} out of range"),
        }
    }

    /// Name this register at the given operand width in bytes (1, 2, 4, or 8). REX-requiring
    /// low-byte names (`%dil`, `%sil`, `%bpl`, `%spl`, `%r8b..%r15b`) are used where x86-64
    /// requires them instead of the legacy high-byte aliases.
    pub fn name(self, width: u8) -> String {
        use PhysReg::*;
        if let Xmm(n) = self {
            return format!("%xmm{n}");
        }
        let names: [&str; 4] = match self {
            Rax => ["%al", "%ax", "%eax", "%rax"],
            Rcx => ["%cl", "%cx", "%ecx", "%rcx"],
            Rdx => ["%dl", "%dx", "%edx", "%rdx"],
            Rbx => ["%bl", "%bx", "%ebx", "%rbx"],
            Rsp => ["%spl", "%sp", "%esp", "%rsp"],
            Rbp => ["%bpl", "%bp", "%ebp", "%rbp"],
            Rsi => ["%sil", "%si", "%esi", "%rsi"],
            Rdi => ["%dil", "%di", "%edi", "%rdi"],
            R8 => ["%r8b", "%r8w", "%r8d", "%r8"],
            R9 => ["%r9b", "%r9w", "%r9d", "%r9"],
            R10 => ["%r10b", "%r10w", "%r10d", "%r10"],
            R11 => ["%r11b", "%r11w", "%r11d", "%r11"],
            R12 => ["%r12b", "%r12w", "%r12d", "%r12"],
            R13 => ["%r13b", "%r13w", "%r13d", "%r13"],
            R14 => ["%r14b", "%r14w", "%r14d", "%r14"],
            R15 => ["%r15b", "%r15w", "%r15d", "%r15"],
            Xmm(_) => unreachable!(),
        };
        let idx = match width {
            1 => 0,
            2 => 1,
            4 => 2,
            8 => 3,
            other => panic!("unsupported subregister width {other}"),
        };
        names[idx].to_string()
    }
}

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name(8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subregister_names() {
        assert_eq!(PhysReg::Rax.name(8), "%rax");
        assert_eq!(PhysReg::Rax.name(4), "%eax");
        assert_eq!(PhysReg::Rdi.name(1), "%dil");
        assert_eq!(PhysReg::R8.name(1), "%r8b");
        assert_eq!(PhysReg::Xmm(3).name(8), "%xmm3");
    }

    #[test]
    fn classes() {
        assert_eq!(PhysReg::Rax.class(), RegClass::GeneralPurpose);
        assert_eq!(PhysReg::Xmm(0).class(), RegClass::FloatingPoint);
    }

    #[test]
    fn raw_index_round_trips() {
        for reg in ALLOCATABLE_GP.iter().copied().chain([PhysReg::Rbx, PhysReg::Rbp, PhysReg::Rsp]) {
            assert_eq!(PhysReg::from_raw_index(reg.raw_index()), reg);
        }
        for reg in allocatable_fp() {
            assert_eq!(PhysReg::from_raw_index(reg.raw_index()), reg);
        }
    }
}
