//! AT&T-syntax SystemV assembly emission: the last stage of the pipeline, turning a selected,
//! register-allocated [`MachineObject`] into the text an external assembler consumes.
//!
//! Globals are emitted first, then one function at a time with its own constant pool ahead of its
//! code, under a running per-function id that disambiguates `.LBB`/`.LCPI` labels across the file.
//! This target's function-local constant pool holds both floats and strings (`isa::x86::select`
//! pools string constants the same way it pools float literals), so string entries fall back to a
//! plain `.rodata` section instead of joining the `.rodata.cstN` grouping that only makes sense
//! for fixed-size, mergeable entries.

mod text;

use crate::ir::constant::ConstantData;
use crate::ir::global::Linkage;
use crate::ir::{Cfg, Global, GlobalData};
use crate::isa::mir::{ConstPoolEntry, MachineFunction, MachineObject, MachineOperand};
use std::fmt::Write as _;

/// Emit every global and function in `object` as one assembly-language translation unit.
pub fn emit_object(cfg: &Cfg, object: &MachineObject) -> String {
    let mut out = String::new();
    writeln!(out, "\t.file\t\"{}\"", cfg.input_file).unwrap();

    for (global, data) in cfg.globals() {
        if data.init.is_some() {
            emit_global(&mut out, cfg, global, data);
        }
    }

    for (func_id, mf) in object.functions.iter().enumerate() {
        emit_function(&mut out, cfg, mf, func_id);
    }

    writeln!(out, "\t.ident\t\"crucible: cruciblec\"").unwrap();
    writeln!(out, "\t.section\t.note.GNU-stack,\"\",@progbits").unwrap();
    out
}

fn emit_global(out: &mut String, cfg: &Cfg, _global: Global, data: &GlobalData) {
    if data.read_only {
        writeln!(out, "\t.section\t.rodata").unwrap();
    } else {
        writeln!(out, "\t.data").unwrap();
    }
    if data.linkage == Linkage::External {
        writeln!(out, "\t.global\t{}", data.name).unwrap();
    }
    let align = cfg.target.align_of(&cfg.types, data.allocated_ty);
    let size = cfg.target.size_of(&cfg.types, data.allocated_ty);
    writeln!(out, "\t.align\t{align}").unwrap();
    writeln!(out, "\t.type\t{}, @object", data.name).unwrap();
    writeln!(out, "\t.size\t{}, {size}", data.name).unwrap();
    writeln!(out, "{}:", data.name).unwrap();
    let init = data.init.expect("checked by the caller");
    emit_constant_directive(out, cfg.constants.data(init), size);
}

/// Emit the `.byte/.word/.long/.quad/.string` directive for a top-level constant of `size` bytes.
fn emit_constant_directive(out: &mut String, constant: &ConstantData, size: u64) {
    match constant {
        ConstantData::Int { bits, .. } => {
            let directive = match size {
                1 => "byte",
                2 => "word",
                4 => "long",
                8 => "quad",
                other => panic!("unsupported integer constant size {other}"),
            };
            writeln!(out, "\t.{directive}\t{bits}").unwrap();
        }
        ConstantData::Float { bits, .. } => {
            let directive = if size == 4 { "long" } else { "quad" };
            let masked = if size == 4 { *bits as u32 as u64 } else { *bits };
            writeln!(out, "\t.{directive}\t0x{masked:x}").unwrap();
        }
        ConstantData::Null { .. } => {
            writeln!(out, "\t.quad\t0x0").unwrap();
        }
        ConstantData::BlockAddress { .. } => {
            panic!("a block address can only appear as a jump/branch operand, never a global initializer");
        }
        ConstantData::String { bytes } => {
            writeln!(out, "\t.string\t\"{}\"", text::escape_string(bytes)).unwrap();
        }
    }
}

fn emit_function(out: &mut String, cfg: &Cfg, mf: &MachineFunction, func_id: usize) {
    writeln!(out, "# begin function {}", mf.name).unwrap();

    emit_function_const_pool(out, &mf.const_pool, func_id);

    writeln!(out, "\t.text").unwrap();
    if mf.external {
        writeln!(out, "\t.global\t{}", mf.name).unwrap();
    }
    writeln!(out, "\t.p2align 4").unwrap();
    writeln!(out, "\t.type\t{}, @function", mf.name).unwrap();
    writeln!(out, "{}:", mf.name).unwrap();
    writeln!(out, "\t.cfi_startproc").unwrap();
    writeln!(out, "\tpushq\t%rbp").unwrap();
    writeln!(out, "\t.cfi_def_cfa_offset 16").unwrap();
    writeln!(out, "\t.cfi_offset %rbp, -16").unwrap();
    writeln!(out, "\tmovq\t%rsp, %rbp").unwrap();
    writeln!(out, "\t.cfi_def_cfa_register %rbp").unwrap();
    writeln!(out, "\tsubq\t${}, %rsp", mf.frame_size).unwrap();

    let func = cfg.function_by_name(&mf.name).map(|f| cfg.function(f));
    let positions = block_positions(mf);
    for (pos, (block, mb)) in mf.blocks.iter().enumerate() {
        let has_preds = func.map(|f| !f.block(*block).preds.is_empty()).unwrap_or(pos != 0);
        if has_preds {
            writeln!(out, ".LBB{func_id}_{pos}:").unwrap();
        } else {
            writeln!(out, "#bb{pos}:").unwrap();
        }
        for inst in &mb.insts {
            emit_instruction(out, inst, mf, func_id, &positions);
        }
    }

    writeln!(out, ".LFE{func_id}:").unwrap();
    writeln!(out, "\t.size\t{}, .LFE{func_id}-{}", mf.name, mf.name).unwrap();
    writeln!(out, "\t.cfi_endproc").unwrap();
    writeln!(out, "# end function {}\n", mf.name).unwrap();
}

/// Map each block this function selected to its position within `mf.blocks`, for `.LBB`/`#bb`
/// label references from branch/jump operands.
fn block_positions(mf: &MachineFunction) -> std::collections::HashMap<crate::ir::Block, usize> {
    mf.blocks.iter().enumerate().map(|(pos, (block, _))| (*block, pos)).collect()
}

fn emit_function_const_pool(out: &mut String, const_pool: &[ConstPoolEntry], func_id: usize) {
    let mut last_size: Option<usize> = None;
    for (idx, entry) in const_pool.iter().enumerate() {
        match entry {
            ConstPoolEntry::Float { width, bits } => {
                let size = (*width as usize) / 8;
                if last_size != Some(size) {
                    writeln!(out, "\t.section\t.rodata.cst{size},\"aM\",@progbits,{size}").unwrap();
                    writeln!(out, "\t.p2align\t{}, 0x0", size.trailing_zeros()).unwrap();
                    last_size = Some(size);
                }
                writeln!(out, ".LCPI{func_id}_{idx}:").unwrap();
                let directive = if size == 4 { "long" } else { "quad" };
                let masked = if size == 4 { *bits as u32 as u64 } else { *bits };
                writeln!(out, "\t.{directive}\t0x{masked:x}").unwrap();
            }
            ConstPoolEntry::Str { bytes } => {
                if last_size.is_some() {
                    writeln!(out, "\t.section\t.rodata").unwrap();
                    last_size = None;
                }
                writeln!(out, ".LCPI{func_id}_{idx}:").unwrap();
                writeln!(out, "\t.string\t\"{}\"", text::escape_string(bytes)).unwrap();
            }
        }
    }
}

fn emit_instruction(
    out: &mut String,
    inst: &crate::isa::mir::MachineInst,
    mf: &MachineFunction,
    func_id: usize,
    positions: &std::collections::HashMap<crate::ir::Block, usize>,
) {
    if text::is_redundant_move(inst.mnemonic, &inst.operands, mf) {
        return;
    }

    if let Some(comment) = &inst.pre_comment {
        writeln!(out, "\t# {comment}").unwrap();
    }

    if inst.mnemonic == "$return" {
        writeln!(out, "\taddq\t${}, %rsp", mf.frame_size).unwrap();
        writeln!(out, "\tpopq\t%rbp").unwrap();
        writeln!(out, "\t.cfi_def_cfa %rsp, 8").unwrap();
        writeln!(out, "\tretq").unwrap();
        return;
    }

    let explicit: Vec<&MachineOperand> =
        inst.operands.iter().filter(|op| !matches!(op, MachineOperand::Reg(r) if r.implicit)).collect();

    write!(out, "\t{}\t", inst.mnemonic).unwrap();
    for (i, operand) in explicit.iter().enumerate() {
        emit_operand(out, operand, mf, func_id, positions);
        if i + 1 != explicit.len() {
            write!(out, ", ").unwrap();
        }
    }
    writeln!(out).unwrap();
}

fn emit_operand(
    out: &mut String,
    operand: &MachineOperand,
    mf: &MachineFunction,
    func_id: usize,
    positions: &std::collections::HashMap<crate::ir::Block, usize>,
) {
    match operand {
        MachineOperand::Reg(r) => {
            write!(out, "{}", text::reg_text(r, mf)).unwrap();
        }
        MachineOperand::Mem(m) => {
            if m.offset != 0 {
                write!(out, "{}", m.offset).unwrap();
            }
            write!(out, "({})", text::map_register(m.base, mf).name(8)).unwrap();
        }
        MachineOperand::Imm(value) => {
            write!(out, "${value}").unwrap();
        }
        MachineOperand::ConstPoolRef(idx) => {
            write!(out, ".LCPI{func_id}_{idx}(%rip)").unwrap();
        }
        MachineOperand::SymbolRef(symbol) => {
            write!(out, "{symbol}").unwrap();
        }
        MachineOperand::BlockRef(block) => {
            let pos = positions.get(block).copied().unwrap_or_else(|| panic!("block not in this function's layout"));
            write!(out, ".LBB{func_id}_{pos}").unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::{InsertMode, InstBuilder};
    use crate::ir::function::Signature;
    use crate::ir::Function;
    use crate::isa::x86::select_function;
    use crate::regalloc::allocate_registers;
    use crate::target::Target;

    fn build_return_42() -> (Cfg, crate::ir::entities::Func) {
        let target = Target::x86_64_linux_systemv();
        let mut cfg = Cfg::new("ret42.cr", target);
        let i64 = cfg.types.int(64);
        let mut func = Function::new("main", Signature { params: vec![], ret: Some(i64) });
        let entry = func.create_block();
        {
            let mut b = InstBuilder::new(&mut func, &mut cfg.types, &mut cfg.constants);
            b.set_insertion(entry, InsertMode::Append);
            let forty_two = b.build_int_constant(i64, 42);
            b.build_return(Some(forty_two));
        }
        let f = cfg.declare_function(func);
        (cfg, f)
    }

    #[test]
    fn emits_file_header_and_function_epilogue() {
        let (cfg, f) = build_return_42();
        let func = cfg.function(f);
        let target = cfg.target.clone();
        let mut mf = select_function(&cfg, func, &func.name, func.linkage == crate::ir::global::Linkage::External, &target).unwrap();
        allocate_registers(func, &mut mf).unwrap();
        let object = MachineObject { source_file: cfg.input_file.clone(), functions: vec![mf] };
        let asm = emit_object(&cfg, &object);

        assert!(asm.starts_with("\t.file\t\"ret42.cr\"\n"));
        assert!(asm.contains("main:"));
        assert!(asm.contains("\tretq\n"));
        assert!(asm.contains(".note.GNU-stack"));
    }

    #[test]
    fn elides_redundant_self_moves() {
        let (cfg, f) = build_return_42();
        let func = cfg.function(f);
        let target = cfg.target.clone();
        let mut mf = select_function(&cfg, func, &func.name, true, &target).unwrap();
        allocate_registers(func, &mut mf).unwrap();
        let object = MachineObject { source_file: cfg.input_file.clone(), functions: vec![mf] };
        let asm = emit_object(&cfg, &object);
        // No instruction should ever read "movq %rax, %rax" style self-moves post-allocation.
        for line in asm.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("movq\t") {
                let mut parts = rest.split(", ");
                if let (Some(a), Some(b)) = (parts.next(), parts.next()) {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
