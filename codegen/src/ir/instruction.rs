//! The instruction taxonomy and per-instruction data.

use crate::ir::entities::{Block, Inst, Type, Value};
use smallvec::SmallVec;

/// The fixed opcode set. Signedness lives in the opcode, never the operand type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Memory
    Load,
    Store,
    /// Pointer arithmetic: scales by element size, or by struct field offset when the pointee is
    /// a struct and the index operand is a field index.
    AccessPtr,

    // Constants
    Constant,
    /// Global-string materialization.
    StringLit,

    // Control
    Jump,
    /// `i1` condition plus two block-address operands.
    BranchIf,
    /// 0 or 1 operand.
    Return,
    Abort,
    Unreachable,
    Phi,

    // Calls
    /// First operand is the callee (a `Function` or `InlineAsm` value).
    Call,

    // Arithmetic
    Iadd,
    Isub,
    Smul,
    Umul,
    Sdiv,
    Udiv,
    Srem,
    Urem,
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    Frem,
    Ineg,
    Fneg,

    // Bitwise/shift
    And,
    Or,
    Xor,
    Shl,
    /// Logical right shift.
    Shr,
    /// Arithmetic (sign-extending) right shift.
    Sar,
    Not,

    // Conversions
    Sext,
    Zext,
    Itrunc,
    Fext,
    Ftrunc,
    Si2fp,
    Ui2fp,
    Fp2si,
    Fp2ui,
    P2i,
    I2p,
    Reinterpret,

    // Select
    Select,

    // Comparisons (produce i1)
    CmpIeq,
    CmpIne,
    CmpSlt,
    CmpSle,
    CmpSgt,
    CmpSge,
    CmpUlt,
    CmpUle,
    CmpUgt,
    CmpUge,
    CmpOeq,
    CmpOne,
    CmpOlt,
    CmpOle,
    CmpOgt,
    CmpOge,
    CmpUneq,
    CmpUnne,
    CmpUnlt,
    CmpUnle,
    CmpUngt,
    CmpUnge,
}

impl Opcode {
    /// Does this opcode have observable effect beyond producing a value — i.e. is it unsafe for
    /// trivial DCE to remove even when it has no uses?
    pub fn has_side_effects(self) -> bool {
        matches!(
            self,
            Opcode::Call
                | Opcode::Store
                | Opcode::Jump
                | Opcode::BranchIf
                | Opcode::Return
                | Opcode::Abort
                | Opcode::Unreachable
                // Load is conservatively side-effecting; the SSA pass must rewrite its users
                // away before DCE can remove it.
                | Opcode::Load
        )
    }

    /// Is this opcode a block terminator?
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::BranchIf | Opcode::Return | Opcode::Abort | Opcode::Unreachable
        )
    }
}

/// A phi operand: an incoming value paired with the predecessor block it arrives from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PhiOperand {
    pub predecessor: Block,
    pub value: Value,
}

/// Per-opcode extra bits that don't warrant their own operand (e.g. load/store alignment,
/// whether a call targets inline asm, truncation/extension widths already implied by `ty`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InstExtra(pub u16);

/// An instruction's operand list. Plain values for most opcodes; explicit `PhiOperand`s for phi
/// instructions, since phi operands must stay paired with their predecessor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operands {
    Values(SmallVec<[Value; 4]>),
    Phi(Vec<PhiOperand>),
}

impl Operands {
    pub fn values(&self) -> &SmallVec<[Value; 4]> {
        match self {
            Operands::Values(v) => v,
            Operands::Phi(_) => panic!("Operands::values called on a phi instruction"),
        }
    }

    pub fn values_mut(&mut self) -> &mut SmallVec<[Value; 4]> {
        match self {
            Operands::Values(v) => v,
            Operands::Phi(_) => panic!("Operands::values_mut called on a phi instruction"),
        }
    }

    /// Iterate the plain values referenced by this instruction, regardless of shape, for
    /// use-list bookkeeping.
    pub fn referenced_values(&self) -> Vec<Value> {
        match self {
            Operands::Values(v) => v.iter().copied().collect(),
            Operands::Phi(ops) => ops.iter().map(|op| op.value).collect(),
        }
    }
}

/// An instruction in a function: opcode, operands, result, type, and intrusive block linkage.
#[derive(Clone, Debug)]
pub struct InstData {
    pub opcode: Opcode,
    pub operands: Operands,
    /// `None` for effect-only instructions that produce no value (store, jump, branch-if,
    /// return, abort, unreachable).
    pub result: Option<Value>,
    pub ty: Option<Type>,
    pub extra: InstExtra,
    pub block: Block,
    pub prev: Option<Inst>,
    pub next: Option<Inst>,
}

impl InstData {
    pub fn is_phi(&self) -> bool {
        self.opcode == Opcode::Phi
    }
}
