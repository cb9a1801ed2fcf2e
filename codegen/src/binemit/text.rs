//! Low-level text helpers shared by the assembly emitter: operand rendering and string escaping.

use crate::isa::mir::{MachineOperand, MachineRegister, RegOperand};
use crate::isa::x86::registers::PhysReg;
use crate::isa::mir::MachineFunction;
use entity::EntityRef;

/// Resolve `reg` to the physical register it was assigned. Already-physical registers pass
/// through unchanged; a virtual register with no assignment means the allocator never ran (or
/// failed), which is a broken invariant this far into the pipeline.
pub fn map_register(reg: MachineRegister, mf: &MachineFunction) -> PhysReg {
    if reg.is_virtual() {
        mf.vreg_assignment[crate::isa::mir::VReg::new(reg.virtual_index() as usize)]
            .unwrap_or_else(|| panic!("virtual register v{} has no assignment", reg.virtual_index()))
    } else {
        PhysReg::from_raw_index(reg.physical_index())
    }
}

/// The AT&T mnemonics this target ever moves a value with a plain register-to-register `mov`.
/// Used to recognize (and elide) a no-op move after register allocation maps both operands to the
/// same physical register.
const MOVE_MNEMONICS: &[&str] = &["movb", "movw", "movl", "movq", "movss", "movsd"];

pub fn is_move_mnemonic(mnemonic: &str) -> bool {
    MOVE_MNEMONICS.contains(&mnemonic)
}

/// True if `operands` is a two-register move between identical (physical register, subregister
/// width) pairs, i.e. one register allocation mapped both sides to the same place.
pub fn is_redundant_move(mnemonic: &str, operands: &[MachineOperand], mf: &MachineFunction) -> bool {
    if !is_move_mnemonic(mnemonic) || operands.len() != 2 {
        return false;
    }
    match (&operands[0], &operands[1]) {
        (MachineOperand::Reg(a), MachineOperand::Reg(b)) => {
            map_register(a.reg, mf) == map_register(b.reg, mf) && a.width == b.width
        }
        _ => false,
    }
}

/// Render a register operand as `%reg`, at the subregister width `op` was selected with.
pub fn reg_text(op: &RegOperand, mf: &MachineFunction) -> String {
    map_register(op.reg, mf).name(op.width)
}

/// Escape a byte string for a GNU-as `.string` directive, matching the C-style escapes the
/// assembler understands.
pub fn escape_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'"' => out.push_str("\\\""),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x08 => out.push_str("\\b"),
            0 => out.push_str("\\0"),
            0x20..=0x7e => out.push(byte as char),
            other => out.push_str(&format!("\\{other:03o}")),
        }
    }
    out
}
