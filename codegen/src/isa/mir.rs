//! Machine IR (MIR): the target-independent shell for post-selection machine instructions.
//!
//! Every ISA backend lowers into the same shapes here — [`MachineRegister`], [`MachineOperand`],
//! [`MachineInst`], [`MachineBlock`], [`MachineFunction`] — so the register allocator and (were a
//! second target ever added) the generic parts of emission don't need to know which ISA produced
//! them. Only the x86-64 selector (`isa::x86::select`) and the register set it draws from
//! (`isa::x86::registers`) are target-specific.

use crate::ir::Block;
use entity::{entity_impl, EntityRef};

/// A register id with three ranges: zero means "no register", `[1, 2^31)` is physical, and
/// `[2^31, 2^32)` is virtual. Virtual registers are resolved to physical ones in place by the
/// register allocator.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineRegister(u32);

const PHYSICAL_BARRIER: u32 = 1;
const VIRTUAL_BARRIER: u32 = 1 << 31;

impl MachineRegister {
    pub const NONE: MachineRegister = MachineRegister(0);

    pub fn physical(index: u32) -> Self {
        debug_assert!(PHYSICAL_BARRIER + index < VIRTUAL_BARRIER);
        MachineRegister(PHYSICAL_BARRIER + index)
    }

    pub fn virtual_reg(index: u32) -> Self {
        MachineRegister(VIRTUAL_BARRIER.checked_add(index).expect("virtual register index overflow"))
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn is_physical(self) -> bool {
        self.0 >= PHYSICAL_BARRIER && self.0 < VIRTUAL_BARRIER
    }

    pub fn is_virtual(self) -> bool {
        self.0 >= VIRTUAL_BARRIER
    }

    pub fn physical_index(self) -> u32 {
        debug_assert!(self.is_physical());
        self.0 - PHYSICAL_BARRIER
    }

    pub fn virtual_index(self) -> u32 {
        debug_assert!(self.is_virtual());
        self.0 - VIRTUAL_BARRIER
    }
}

impl core::fmt::Debug for MachineRegister {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if self.is_none() {
            write!(f, "noreg")
        } else if self.is_physical() {
            write!(f, "p{}", self.physical_index())
        } else {
            write!(f, "v{}", self.virtual_index())
        }
    }
}

/// A reference to a virtual register's metadata, indexed into
/// [`MachineFunction::vregs`](super::x86::select).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VReg(u32);
entity_impl!(VReg, "vr");

/// A register operand: a register plus the subregister width it's accessed at and the
/// def/use/implicit/kill/dead flags the allocator and emitter need.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegOperand {
    pub reg: MachineRegister,
    /// Subregister width in bytes: 1, 2, 4, or 8.
    pub width: u8,
    pub def: bool,
    pub implicit: bool,
    pub kill: bool,
    pub dead: bool,
}

impl RegOperand {
    pub fn use_(reg: MachineRegister, width: u8) -> Self {
        Self { reg, width, def: false, implicit: false, kill: false, dead: false }
    }

    pub fn def(reg: MachineRegister, width: u8) -> Self {
        Self { reg, width, def: true, implicit: false, kill: false, dead: false }
    }

    pub fn kill(mut self) -> Self {
        self.kill = true;
        self
    }

    pub fn implicit(mut self) -> Self {
        self.implicit = true;
        self
    }
}

/// A memory operand: `offset(%base)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemOperand {
    pub base: MachineRegister,
    pub offset: i32,
    pub width: u8,
}

/// An operand to a machine instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum MachineOperand {
    Reg(RegOperand),
    Mem(MemOperand),
    Imm(i64),
    /// A RIP-relative reference to a constant-pool label (`.LCPI<fn>_<idx>(%rip)`).
    ConstPoolRef(usize),
    /// A reference to a global symbol (a function or global variable name).
    SymbolRef(String),
    /// A reference to a block within the same function, rendered as `.LBB<fn>_<blk>` at
    /// emission time.
    BlockRef(Block),
}

/// A single machine instruction: a mnemonic plus its operands, in AT&T source-then-destination
/// order. The mnemonic is the literal assembly opcode text (`"movq"`, `"addl"`, `"cmpb"`, ...);
/// encoding to raw bytes is not in scope (output is text assembly, not an object writer).
#[derive(Clone, Debug)]
pub struct MachineInst {
    pub mnemonic: &'static str,
    pub operands: Vec<MachineOperand>,
    /// CFI/comment annotation emitted immediately before this instruction, if any (prologue and
    /// epilogue directives piggyback on this rather than getting their own MIR opcode).
    pub pre_comment: Option<String>,
}

impl MachineInst {
    pub fn new(mnemonic: &'static str, operands: Vec<MachineOperand>) -> Self {
        Self { mnemonic, operands, pre_comment: None }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.pre_comment = Some(comment.into());
        self
    }
}

/// A basic block's worth of machine instructions, mirroring the IR block it was selected from.
#[derive(Clone, Debug, Default)]
pub struct MachineBlock {
    pub insts: Vec<MachineInst>,
}

/// A function-local constant-pool entry: a float literal or a string, emitted under
/// `.section .rodata.cstN` ahead of the function's code and addressed RIP-relative.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstPoolEntry {
    Float { width: u8, bits: u64 },
    Str { bytes: Vec<u8> },
}

impl ConstPoolEntry {
    pub fn size(&self) -> usize {
        match self {
            ConstPoolEntry::Float { width, .. } => (*width as usize) / 8,
            ConstPoolEntry::Str { bytes } => bytes.len() + 1, // NUL-terminated
        }
    }
}

/// A function's worth of machine instructions: one [`MachineBlock`] per IR block, in the same
/// layout order, plus the frame size computed from its locals.
#[derive(Clone, Debug, Default)]
pub struct MachineFunction {
    pub name: String,
    pub external: bool,
    pub blocks: Vec<(Block, MachineBlock)>,
    /// Total stack frame size in bytes, 16-byte aligned, including spill slots for every
    /// selected `Local`.
    pub frame_size: u32,
    pub const_pool: Vec<ConstPoolEntry>,
    pub vreg_classes: entity::PrimaryMap<VReg, crate::isa::x86::registers::RegClass>,
    pub vreg_assignment: entity::SecondaryMap<VReg, Option<crate::isa::x86::registers::PhysReg>>,
}

impl MachineFunction {
    pub fn new(name: impl Into<String>, external: bool) -> Self {
        Self {
            name: name.into(),
            external,
            blocks: Vec::new(),
            frame_size: 0,
            const_pool: Vec::new(),
            vreg_classes: entity::PrimaryMap::new(),
            vreg_assignment: entity::SecondaryMap::new(),
        }
    }

    /// Append a constant-pool entry, returning its index for a `ConstPoolRef` operand.
    pub fn push_const_pool_entry(&mut self, entry: ConstPoolEntry) -> usize {
        self.const_pool.push(entry);
        self.const_pool.len() - 1
    }

    pub fn new_vreg(&mut self, class: crate::isa::x86::registers::RegClass) -> MachineRegister {
        let vr = self.vreg_classes.push(class);
        MachineRegister::virtual_reg(vr.index() as u32)
    }

    pub fn vreg_class(&self, reg: MachineRegister) -> crate::isa::x86::registers::RegClass {
        self.vreg_classes[VReg::new(reg.virtual_index() as usize)]
    }
}

/// A fully selected translation unit: one [`MachineFunction`] per IR function, plus the
/// unit-level constant pool entries (strings, float literals) accumulated during selection.
#[derive(Clone, Debug, Default)]
pub struct MachineObject {
    pub source_file: String,
    pub functions: Vec<MachineFunction>,
}

/// A plain textual rendering for `--dump-machine-ir`: registers print as `p<n>`/`v<n>` (this runs
/// ahead of register allocation, so virtual registers are still unresolved).
impl core::fmt::Display for MachineOperand {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            MachineOperand::Reg(r) => write!(f, "{:?}", r.reg),
            MachineOperand::Mem(m) => write!(f, "{}({:?})", m.offset, m.base),
            MachineOperand::Imm(i) => write!(f, "${i}"),
            MachineOperand::ConstPoolRef(idx) => write!(f, ".LCPI{idx}"),
            MachineOperand::SymbolRef(s) => write!(f, "{s}"),
            MachineOperand::BlockRef(b) => write!(f, "{b}"),
        }
    }
}

impl core::fmt::Display for MachineInst {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if let Some(comment) = &self.pre_comment {
            writeln!(f, "    # {comment}")?;
        }
        write!(f, "    {}", self.mnemonic)?;
        for (i, op) in self.operands.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { " " } else { ", " }, op)?;
        }
        Ok(())
    }
}

impl core::fmt::Display for MachineFunction {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        writeln!(f, "machine function {} (frame {} bytes) {{", self.name, self.frame_size)?;
        for (block, mb) in &self.blocks {
            writeln!(f, "{block}:")?;
            for inst in &mb.insts {
                writeln!(f, "{inst}")?;
            }
        }
        writeln!(f, "}}")
    }
}

impl core::fmt::Display for MachineObject {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        for (i, func) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
