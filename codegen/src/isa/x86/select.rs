//! x86-64 instruction selection: lowers each IR opcode to a sequence of [`MachineInst`]s.

use crate::ir::{
    Block, Cfg, Const, ConstantData, Function, Inst, InstData, Opcode, Operands, Type, TypeData,
    Value, ValueData, ValueGraph,
};
use crate::ir::constant::ConstantPool;
use crate::isa::mir::{ConstPoolEntry, MachineBlock, MachineFunction, MachineInst, MachineOperand, MachineRegister, MemOperand, RegOperand};
use crate::isa::x86::registers::{PhysReg, RegClass, SYSV_INT_ARG_REGS};
use crate::result::{CodegenError, CodegenResult};
use crate::target::Target;
use std::collections::HashMap;

/// Selects one function's IR into a [`MachineFunction`].
pub fn select_function(cfg: &Cfg, func: &Function, func_name: &str, external: bool, target: &Target) -> CodegenResult<MachineFunction> {
    let mut sel = Selector::new(cfg, func, target, MachineFunction::new(func_name, external));
    sel.allocate_locals();
    sel.predeclare_results();
    sel.bind_arguments();
    for block in func.blocks_in_layout_order() {
        sel.select_block(block)?;
    }
    Ok(sel.mf)
}

struct Selector<'a> {
    cfg: &'a Cfg,
    func: &'a Function,
    target: &'a Target,
    mf: MachineFunction,
    /// Registers already assigned to an IR value: instruction results from the prepass, function
    /// arguments bound at entry, and locals/globals materialized lazily on first use.
    value_reg: HashMap<Value, MachineRegister>,
    local_offset: HashMap<crate::ir::Local, i32>,
    const_pool_index: HashMap<Const, usize>,
    current_block: Option<Block>,
}

impl<'a> Selector<'a> {
    fn new(cfg: &'a Cfg, func: &'a Function, target: &'a Target, mf: MachineFunction) -> Self {
        Self {
            cfg,
            func,
            target,
            mf,
            value_reg: HashMap::new(),
            local_offset: HashMap::new(),
            const_pool_index: HashMap::new(),
            current_block: None,
        }
    }

    fn types(&self) -> &crate::ir::TypePool {
        &self.cfg.types
    }

    fn consts(&self) -> &ConstantPool {
        &self.cfg.constants
    }

    fn values(&self) -> &ValueGraph {
        &self.func.values
    }

    /// Lay out every `Local` in declaration order, accumulating offsets down from the frame base.
    fn allocate_locals(&mut self) {
        let mut offset: i64 = 0;
        for local in self.func.locals_in_declaration_order() {
            let ty = self.func.local_allocated_ty(local);
            let size = self.target.size_of(self.types(), ty) as i64;
            let align = self.target.align_of(self.types(), ty) as i64;
            offset = round_up(offset, align);
            offset += size;
            self.local_offset.insert(local, -(offset as i32));
        }
        self.mf.frame_size = round_up(offset, 16) as u32;
    }

    /// Pre-allocate a virtual register for every instruction result in the function, so operand
    /// lookups never race layout order against definition order.
    fn predeclare_results(&mut self) {
        for block in self.func.blocks_in_layout_order() {
            for inst in self.func.block_insts(block) {
                if let Some(result) = self.func.inst_result(inst) {
                    let ty = self.values().ty(result).expect("instruction result must be typed");
                    let class = reg_class_of(self.types(), ty);
                    let vreg = self.mf.new_vreg(class);
                    self.value_reg.insert(result, vreg);
                }
            }
        }
    }

    /// Copy each SystemV argument register into its argument's virtual register, at the top of
    /// the entry block.
    fn bind_arguments(&mut self) {
        let entry = match self.func.entry_block() {
            Some(b) => b,
            None => return,
        };
        let mut int_idx = 0usize;
        let mut fp_idx = 0usize;
        let mut prologue = Vec::new();
        for i in 0..self.func.argument_count() {
            let value = self.func.argument_value(i);
            let ty = self.values().ty(value).expect("argument must be typed");
            let class = reg_class_of(self.types(), ty);
            let vreg = self.mf.new_vreg(class);
            self.value_reg.insert(value, vreg);
            let width = self.target.size_of(self.types(), ty) as u8;
            match class {
                RegClass::GeneralPurpose => {
                    let src = MachineRegister::physical(phys_index(SYSV_INT_ARG_REGS[int_idx]));
                    int_idx += 1;
                    prologue.push(mov_reg(class, src, vreg, width.max(4)));
                }
                RegClass::FloatingPoint => {
                    let src = MachineRegister::physical(fp_arg_phys_index(fp_idx));
                    fp_idx += 1;
                    prologue.push(mov_reg(class, src, vreg, width));
                }
                RegClass::Vector => unreachable!("no vector-typed arguments exist"),
            }
        }
        self.mf.blocks.push((entry, MachineBlock { insts: prologue }));
    }

    fn block_mut(&mut self, block: Block) -> &mut MachineBlock {
        if self.mf.blocks.last().map(|(b, _)| *b) != Some(block) {
            self.mf.blocks.push((block, MachineBlock::default()));
        }
        &mut self.mf.blocks.last_mut().unwrap().1
    }

    fn emit(&mut self, block: Block, inst: MachineInst) {
        self.block_mut(block).insts.push(inst);
    }

    fn select_block(&mut self, block: Block) -> CodegenResult<()> {
        self.block_mut(block);
        for inst in self.func.block_insts(block) {
            self.select_inst(block, inst)?;
        }
        Ok(())
    }

    fn operand_ty(&self, v: Value) -> Option<Type> {
        self.values().ty(v)
    }

    /// Argument vregs are seeded directly into `value_reg` by [`Self::bind_arguments`]; this fills
    /// in the lazily-materialized kinds (locals, globals, constants) on first use.
    fn reg_of(&mut self, v: Value) -> MachineRegister {
        if let Some(&r) = self.value_reg.get(&v) {
            return r;
        }
        let block = self.current_block.expect("reg_of called outside instruction selection");
        let r = match self.values().data(v) {
            ValueData::Local(local) => {
                let ptr_ty = self.operand_ty(v).unwrap();
                let class = reg_class_of(self.types(), ptr_ty);
                let dst = self.mf.new_vreg(class);
                let offset = self.local_offset[&local];
                self.emit(
                    block,
                    MachineInst::new("leaq", vec![
                        MachineOperand::Mem(MemOperand { base: MachineRegister::physical(phys_index(PhysReg::Rbp)), offset, width: 8 }),
                        MachineOperand::Reg(RegOperand::def(dst, 8)),
                    ]),
                );
                dst
            }
            ValueData::Constant(c) => {
                let ty = self.operand_ty(v).unwrap();
                self.materialize_constant(block, c, ty)
            }
            ValueData::Global(global) => {
                let name = self.cfg.global(global).name.clone();
                let dst = self.mf.new_vreg(RegClass::GeneralPurpose);
                self.emit(
                    block,
                    MachineInst::new("leaq", vec![MachineOperand::SymbolRef(name), MachineOperand::Reg(RegOperand::def(dst, 8))]),
                );
                dst
            }
            other => panic!("value {v:?} ({other:?}) has no pre-assigned register"),
        };
        self.value_reg.insert(v, r);
        r
    }

    fn materialize_constant(&mut self, block: Block, c: Const, ty: Type) -> MachineRegister {
        match self.consts().data(c).clone() {
            ConstantData::Int { bits, .. } => {
                let dst = self.mf.new_vreg(RegClass::GeneralPurpose);
                let width = self.target.size_of(self.types(), ty) as u8;
                self.emit(block, MachineInst::new(mov_mnemonic(width.max(4)), vec![MachineOperand::Imm(bits as i64), MachineOperand::Reg(RegOperand::def(dst, width.max(4)))]));
                dst
            }
            ConstantData::Float { bits, .. } => {
                let width = self.target.size_of(self.types(), ty) as u8;
                let idx = *self.const_pool_index.entry(c).or_insert_with(|| self.mf.push_const_pool_entry(ConstPoolEntry::Float { width, bits }));
                let dst = self.mf.new_vreg(RegClass::FloatingPoint);
                let mnemonic = if width == 4 { "movss" } else { "movsd" };
                self.emit(block, MachineInst::new(mnemonic, vec![MachineOperand::ConstPoolRef(idx), MachineOperand::Reg(RegOperand::def(dst, width))]));
                dst
            }
            ConstantData::Null { .. } => {
                let dst = self.mf.new_vreg(RegClass::GeneralPurpose);
                self.emit(block, MachineInst::new("movq", vec![MachineOperand::Imm(0), MachineOperand::Reg(RegOperand::def(dst, 8))]));
                dst
            }
            ConstantData::BlockAddress { .. } => {
                unreachable!("block addresses are consumed directly by jump/branch-if selection")
            }
            ConstantData::String { bytes } => {
                let idx = *self.const_pool_index.entry(c).or_insert_with(|| self.mf.push_const_pool_entry(ConstPoolEntry::Str { bytes }));
                let dst = self.mf.new_vreg(RegClass::GeneralPurpose);
                self.emit(block, MachineInst::new("leaq", vec![MachineOperand::ConstPoolRef(idx), MachineOperand::Reg(RegOperand::def(dst, 8))]));
                dst
            }
        }
    }

    fn width_of(&self, v: Value) -> u8 {
        self.target.size_of(self.types(), self.operand_ty(v).expect("operand must be typed")) as u8
    }

    fn select_inst(&mut self, block: Block, inst: Inst) -> CodegenResult<()> {
        self.current_block = Some(block);
        let data = self.func.inst(inst).clone();

        match data.opcode {
            Opcode::Phi => { /* resolved by predecessors' terminator lowering, see lower_phi_copies */ }

            Opcode::Constant | Opcode::StringLit => {
                let operand = data.operands.values()[0];
                let r = self.reg_of(operand);
                let dst = self.value_reg[&data.result.unwrap()];
                if r != dst {
                    let width = self.width_of(operand);
                    let class = reg_class_of(self.types(), self.operand_ty(operand).unwrap());
                    self.emit(block, mov_reg(class, r, dst, width.max(4)));
                }
            }

            Opcode::Load => {
                let ptr = data.operands.values()[0];
                let base = self.reg_of(ptr);
                let dst = self.value_reg[&data.result.unwrap()];
                let ty = data.ty.unwrap();
                let width = self.target.size_of(self.types(), ty) as u8;
                let mnemonic = if self.types().is_float(ty) {
                    if width == 4 { "movss" } else { "movsd" }
                } else {
                    mov_mnemonic(width)
                };
                self.emit(block, MachineInst::new(mnemonic, vec![
                    MachineOperand::Mem(MemOperand { base, offset: 0, width }),
                    MachineOperand::Reg(RegOperand::def(dst, width)),
                ]));
            }

            Opcode::Store => {
                let ptr = data.operands.values()[0];
                let val = data.operands.values()[1];
                let base = self.reg_of(ptr);
                let src = self.reg_of(val);
                let width = self.width_of(val);
                let is_float = self.types().is_float(self.operand_ty(val).unwrap());
                let mnemonic = if is_float {
                    if width == 4 { "movss" } else { "movsd" }
                } else {
                    mov_mnemonic(width)
                };
                self.emit(block, MachineInst::new(mnemonic, vec![
                    MachineOperand::Reg(RegOperand::use_(src, width)),
                    MachineOperand::Mem(MemOperand { base, offset: 0, width }),
                ]));
            }

            Opcode::AccessPtr => self.select_access_ptr(block, &data),

            Opcode::Jump => {
                let dest = block_address_operand(data.operands.values()[0], self.values(), self.consts());
                self.lower_phi_copies(block, dest);
                self.emit(block, MachineInst::new("jmp", vec![MachineOperand::BlockRef(dest)]));
            }

            Opcode::BranchIf => {
                let vals = data.operands.values();
                let cond = vals[0];
                let then_block = block_address_operand(vals[1], self.values(), self.consts());
                let else_block = block_address_operand(vals[2], self.values(), self.consts());
                self.select_branch_if(block, cond, then_block, else_block);
            }

            Opcode::Return => {
                if let Some(&val) = data.operands.values().first() {
                    let ty = self.operand_ty(val).unwrap();
                    let src = self.reg_of(val);
                    let width = self.target.size_of(self.types(), ty) as u8;
                    if self.types().is_float(ty) {
                        let ret = MachineRegister::physical(fp_arg_phys_index(0));
                        self.emit(block, mov_reg(RegClass::FloatingPoint, src, ret, width));
                    } else {
                        let ret = MachineRegister::physical(phys_index(crate::isa::x86::registers::RETURN_INT));
                        self.emit(block, mov_reg(RegClass::GeneralPurpose, src, ret, width.max(4)));
                    }
                }
                // Expanded by the emitter into the epilogue (`addq $frame,%rsp; popq %rbp; retq`).
                self.emit(block, MachineInst::new("$return", vec![]));
            }

            Opcode::Abort => {
                self.emit(block, MachineInst::new("callq", vec![MachineOperand::SymbolRef("abort@PLT".to_string())]));
            }

            Opcode::Unreachable => {
                self.emit(block, MachineInst::new("ud2", vec![]));
            }

            Opcode::Call => self.select_call(block, &data)?,

            Opcode::Iadd | Opcode::Isub | Opcode::Smul | Opcode::Umul | Opcode::And | Opcode::Or | Opcode::Xor => {
                self.select_int_binary(block, &data);
            }

            Opcode::Fadd | Opcode::Fsub | Opcode::Fmul | Opcode::Fdiv => {
                self.select_float_binary(block, &data);
            }

            Opcode::Frem => {
                panic!("frem lowering requires a libm call, not supported by this target");
            }

            Opcode::Sdiv | Opcode::Udiv | Opcode::Srem | Opcode::Urem => {
                self.select_int_div(block, &data);
            }

            Opcode::Ineg => {
                let v = data.operands.values()[0];
                let src = self.reg_of(v);
                let dst = self.value_reg[&data.result.unwrap()];
                let width = self.width_of(v);
                if src != dst {
                    self.emit(block, mov_reg(RegClass::GeneralPurpose, src, dst, width.max(4)));
                }
                self.emit(block, MachineInst::new(neg_mnemonic(width), vec![MachineOperand::Reg(RegOperand::def(dst, width))]));
            }

            Opcode::Fneg => {
                let v = data.operands.values()[0];
                let src = self.reg_of(v);
                let dst = self.value_reg[&data.result.unwrap()];
                let width = self.width_of(v);
                if src != dst {
                    self.emit(block, mov_reg(RegClass::FloatingPoint, src, dst, width));
                }
                let mnemonic = if width == 4 { "xorps" } else { "xorpd" };
                self.emit(block, MachineInst::new(mnemonic, vec![MachineOperand::Imm(i64::MIN), MachineOperand::Reg(RegOperand::def(dst, width))]));
            }

            Opcode::Not => {
                let v = data.operands.values()[0];
                let src = self.reg_of(v);
                let dst = self.value_reg[&data.result.unwrap()];
                let width = self.width_of(v);
                if src != dst {
                    self.emit(block, mov_reg(RegClass::GeneralPurpose, src, dst, width.max(4)));
                }
                self.emit(block, MachineInst::new(not_mnemonic(width), vec![MachineOperand::Reg(RegOperand::def(dst, width))]));
            }

            Opcode::Shl | Opcode::Shr | Opcode::Sar => self.select_shift(block, &data),

            Opcode::Sext | Opcode::Zext | Opcode::Itrunc | Opcode::Fext | Opcode::Ftrunc | Opcode::Si2fp
            | Opcode::Ui2fp | Opcode::Fp2si | Opcode::Fp2ui | Opcode::P2i | Opcode::I2p | Opcode::Reinterpret => {
                self.select_conversion(block, &data);
            }

            Opcode::Select => {
                let vals = data.operands.values();
                let (cond, t, f) = (vals[0], vals[1], vals[2]);
                let dst = self.value_reg[&data.result.unwrap()];
                let width = self.width_of(t);
                let class = reg_class_of(self.types(), self.operand_ty(t).unwrap());
                let fr = self.reg_of(f);
                let tr = self.reg_of(t);
                let cr = self.reg_of(cond);
                self.emit(block, mov_reg(class, fr, dst, width));
                self.emit(block, MachineInst::new("cmpb", vec![MachineOperand::Imm(0), MachineOperand::Reg(RegOperand::use_(cr, 1))]));
                let mnemonic = if class == RegClass::GeneralPurpose { "cmovneq" } else { "cmovne.sse" };
                self.emit(block, MachineInst::new(mnemonic, vec![MachineOperand::Reg(RegOperand::use_(tr, width)), MachineOperand::Reg(RegOperand::def(dst, width))]));
            }

            Opcode::CmpIeq | Opcode::CmpIne | Opcode::CmpSlt | Opcode::CmpSle | Opcode::CmpSgt | Opcode::CmpSge
            | Opcode::CmpUlt | Opcode::CmpUle | Opcode::CmpUgt | Opcode::CmpUge => {
                self.select_int_compare(block, &data);
            }

            Opcode::CmpOeq | Opcode::CmpOne | Opcode::CmpOlt | Opcode::CmpOle | Opcode::CmpOgt | Opcode::CmpOge
            | Opcode::CmpUneq | Opcode::CmpUnne | Opcode::CmpUnlt | Opcode::CmpUnle | Opcode::CmpUngt | Opcode::CmpUnge => {
                self.select_float_compare(block, &data);
            }
        }
        Ok(())
    }

    fn select_access_ptr(&mut self, block: Block, data: &InstData) {
        let vals = data.operands.values();
        let (base_val, index_val) = (vals[0], vals[1]);
        let base = self.reg_of(base_val);
        let dst = self.value_reg[&data.result.unwrap()];
        let base_ty = self.operand_ty(base_val).unwrap();
        let pointee = match self.types().data(base_ty) {
            TypeData::Pointer { pointee } => *pointee,
            other => panic!("access-ptr base must be a pointer, got {other:?}"),
        };
        if base != dst {
            self.emit(block, MachineInst::new("movq", vec![MachineOperand::Reg(RegOperand::use_(base, 8)), MachineOperand::Reg(RegOperand::def(dst, 8))]));
        }
        if self.types().is_struct(pointee) {
            let field_index = match self.values().data(index_val) {
                ValueData::Constant(c) => match self.consts().data(c) {
                    ConstantData::Int { bits, .. } => *bits as usize,
                    _ => panic!("struct field index must be an integer constant"),
                },
                _ => panic!("struct field index must be a constant"),
            };
            let offset = self.target.field_offset(self.types(), pointee, field_index) as i64;
            if offset != 0 {
                self.emit(block, MachineInst::new("addq", vec![MachineOperand::Imm(offset), MachineOperand::Reg(RegOperand::def(dst, 8))]));
            }
        } else {
            let elem_size = self.target.size_of(self.types(), pointee) as i64;
            if elem_size != 0 {
                let index_reg = self.reg_of(index_val);
                let scaled = self.mf.new_vreg(RegClass::GeneralPurpose);
                self.emit(block, MachineInst::new("movq", vec![MachineOperand::Reg(RegOperand::use_(index_reg, 8)), MachineOperand::Reg(RegOperand::def(scaled, 8))]));
                self.emit(block, MachineInst::new("imulq", vec![MachineOperand::Imm(elem_size), MachineOperand::Reg(RegOperand::def(scaled, 8))]));
                self.emit(block, MachineInst::new("addq", vec![MachineOperand::Reg(RegOperand::use_(scaled, 8)), MachineOperand::Reg(RegOperand::def(dst, 8))]));
            }
        }
    }

    fn select_int_binary(&mut self, block: Block, data: &InstData) {
        let vals = data.operands.values();
        let (lhs, rhs) = (vals[0], vals[1]);
        let dst = self.value_reg[&data.result.unwrap()];
        let width = self.target.size_of(self.types(), data.ty.unwrap()) as u8;
        let l = self.reg_of(lhs);
        let r = self.reg_of(rhs);
        // x86-64's two-operand forms destroy the left operand; pre-move it into `dst`.
        self.emit(block, mov_reg(RegClass::GeneralPurpose, l, dst, width.max(4)));
        let mnemonic = match data.opcode {
            Opcode::Iadd => add_mnemonic(width),
            Opcode::Isub => sub_mnemonic(width),
            Opcode::Smul | Opcode::Umul => imul_mnemonic(width),
            Opcode::And => and_mnemonic(width),
            Opcode::Or => or_mnemonic(width),
            Opcode::Xor => xor_mnemonic(width),
            _ => unreachable!(),
        };
        self.emit(block, MachineInst::new(mnemonic, vec![MachineOperand::Reg(RegOperand::use_(r, width)), MachineOperand::Reg(RegOperand::def(dst, width))]));
    }

    fn select_float_binary(&mut self, block: Block, data: &InstData) {
        let vals = data.operands.values();
        let (lhs, rhs) = (vals[0], vals[1]);
        let dst = self.value_reg[&data.result.unwrap()];
        let width = self.target.size_of(self.types(), data.ty.unwrap()) as u8;
        let l = self.reg_of(lhs);
        let r = self.reg_of(rhs);
        self.emit(block, mov_reg(RegClass::FloatingPoint, l, dst, width));
        let single = width == 4;
        let mnemonic = match (data.opcode, single) {
            (Opcode::Fadd, true) => "addss",
            (Opcode::Fadd, false) => "addsd",
            (Opcode::Fsub, true) => "subss",
            (Opcode::Fsub, false) => "subsd",
            (Opcode::Fmul, true) => "mulss",
            (Opcode::Fmul, false) => "mulsd",
            (Opcode::Fdiv, true) => "divss",
            (Opcode::Fdiv, false) => "divsd",
            _ => unreachable!(),
        };
        self.emit(block, MachineInst::new(mnemonic, vec![MachineOperand::Reg(RegOperand::use_(r, width)), MachineOperand::Reg(RegOperand::def(dst, width))]));
    }

    fn select_int_div(&mut self, block: Block, data: &InstData) {
        let vals = data.operands.values();
        let (lhs, rhs) = (vals[0], vals[1]);
        let width = self.target.size_of(self.types(), self.operand_ty(lhs).unwrap()) as u8;
        let l = self.reg_of(lhs);
        let r = self.reg_of(rhs);
        let rax = MachineRegister::physical(phys_index(PhysReg::Rax));
        let rdx = MachineRegister::physical(phys_index(PhysReg::Rdx));
        self.emit(block, mov_reg(RegClass::GeneralPurpose, l, rax, width.max(4)));
        let signed = matches!(data.opcode, Opcode::Sdiv | Opcode::Srem);
        if signed {
            self.emit(block, MachineInst::new(cqo_mnemonic(width), vec![]));
        } else {
            self.emit(block, MachineInst::new("movl", vec![MachineOperand::Imm(0), MachineOperand::Reg(RegOperand::def(rdx, 4))]));
        }
        let mnemonic = if signed { idiv_mnemonic(width) } else { div_mnemonic(width) };
        self.emit(block, MachineInst::new(mnemonic, vec![MachineOperand::Reg(RegOperand::use_(r, width))]));
        let dst = self.value_reg[&data.result.unwrap()];
        let source = match data.opcode {
            Opcode::Sdiv | Opcode::Udiv => rax,
            Opcode::Srem | Opcode::Urem => rdx,
            _ => unreachable!(),
        };
        self.emit(block, mov_reg(RegClass::GeneralPurpose, source, dst, width.max(4)));
    }

    fn select_shift(&mut self, block: Block, data: &InstData) {
        let vals = data.operands.values();
        let (lhs, rhs) = (vals[0], vals[1]);
        let dst = self.value_reg[&data.result.unwrap()];
        let width = self.target.size_of(self.types(), data.ty.unwrap()) as u8;
        let l = self.reg_of(lhs);
        self.emit(block, mov_reg(RegClass::GeneralPurpose, l, dst, width.max(4)));
        let mnemonic = match data.opcode {
            Opcode::Shl => shl_mnemonic(width),
            Opcode::Shr => shr_mnemonic(width),
            Opcode::Sar => sar_mnemonic(width),
            _ => unreachable!(),
        };
        if let ValueData::Constant(c) = self.values().data(rhs) {
            if let ConstantData::Int { bits, .. } = self.consts().data(c) {
                self.emit(block, MachineInst::new(mnemonic, vec![MachineOperand::Imm(*bits as i64), MachineOperand::Reg(RegOperand::def(dst, width))]));
                return;
            }
        }
        let r = self.reg_of(rhs);
        let rcx = MachineRegister::physical(phys_index(PhysReg::Rcx));
        self.emit(block, mov_reg(RegClass::GeneralPurpose, r, rcx, 1));
        self.emit(block, MachineInst::new(mnemonic, vec![MachineOperand::Reg(RegOperand::use_(rcx, 1)), MachineOperand::Reg(RegOperand::def(dst, width))]));
    }

    fn select_conversion(&mut self, block: Block, data: &InstData) {
        let v = data.operands.values()[0];
        let src = self.reg_of(v);
        let dst = self.value_reg[&data.result.unwrap()];
        let src_ty = self.operand_ty(v).unwrap();
        let dst_ty = data.ty.unwrap();
        let src_w = self.target.size_of(self.types(), src_ty) as u8;
        let dst_w = self.target.size_of(self.types(), dst_ty) as u8;
        match data.opcode {
            Opcode::Sext => self.emit(block, MachineInst::new(movsx_mnemonic(src_w, dst_w), vec![MachineOperand::Reg(RegOperand::use_(src, src_w)), MachineOperand::Reg(RegOperand::def(dst, dst_w))])),
            Opcode::Zext => {
                if src_w == 4 && dst_w == 8 {
                    // A plain 32-bit mov already zero-extends into the full 64-bit register.
                    self.emit(block, MachineInst::new("movl", vec![MachineOperand::Reg(RegOperand::use_(src, 4)), MachineOperand::Reg(RegOperand::def(dst, 4))]));
                } else {
                    self.emit(block, MachineInst::new(movzx_mnemonic(src_w, dst_w), vec![MachineOperand::Reg(RegOperand::use_(src, src_w)), MachineOperand::Reg(RegOperand::def(dst, dst_w))]));
                }
            }
            Opcode::Itrunc => self.emit(block, mov_reg(RegClass::GeneralPurpose, src, dst, dst_w.max(4))),
            Opcode::Fext => self.emit(block, MachineInst::new("cvtss2sd", vec![MachineOperand::Reg(RegOperand::use_(src, 4)), MachineOperand::Reg(RegOperand::def(dst, 8))])),
            Opcode::Ftrunc => self.emit(block, MachineInst::new("cvtsd2ss", vec![MachineOperand::Reg(RegOperand::use_(src, 8)), MachineOperand::Reg(RegOperand::def(dst, 4))])),
            Opcode::Si2fp => self.emit(block, MachineInst::new(if dst_w == 4 { "cvtsi2ss" } else { "cvtsi2sd" }, vec![MachineOperand::Reg(RegOperand::use_(src, src_w.max(4))), MachineOperand::Reg(RegOperand::def(dst, dst_w))])),
            Opcode::Ui2fp => self.emit(block, MachineInst::new(if dst_w == 4 { "cvtsi2ss" } else { "cvtsi2sd" }, vec![MachineOperand::Reg(RegOperand::use_(src, 8)), MachineOperand::Reg(RegOperand::def(dst, dst_w))])),
            Opcode::Fp2si | Opcode::Fp2ui => self.emit(block, MachineInst::new(if src_w == 4 { "cvttss2si" } else { "cvttsd2si" }, vec![MachineOperand::Reg(RegOperand::use_(src, src_w)), MachineOperand::Reg(RegOperand::def(dst, dst_w.max(4)))])),
            Opcode::P2i | Opcode::I2p | Opcode::Reinterpret => self.emit(block, mov_reg(RegClass::GeneralPurpose, src, dst, 8)),
            _ => unreachable!(),
        }
    }

    fn select_int_compare(&mut self, block: Block, data: &InstData) {
        let vals = data.operands.values();
        let (mut lhs, mut rhs) = (vals[0], vals[1]);
        let mut cc = int_condition_code(data.opcode);
        // CMP's right-hand operand is the one that may be an immediate; flip operand order (and
        // the condition) when only the would-be-right side is a compile-time constant.
        if is_const(self.values(), rhs) && !is_const(self.values(), lhs) {
            std::mem::swap(&mut lhs, &mut rhs);
            cc = flip_condition(cc);
        }
        let width = self.target.size_of(self.types(), self.operand_ty(lhs).unwrap()) as u8;
        let l = self.reg_of(lhs);
        let r = self.reg_of(rhs);
        let dst = self.value_reg[&data.result.unwrap()];
        self.emit(block, MachineInst::new(cmp_mnemonic(width), vec![MachineOperand::Reg(RegOperand::use_(r, width)), MachineOperand::Reg(RegOperand::use_(l, width))]));
        self.emit(block, MachineInst::new(setcc_mnemonic(cc), vec![MachineOperand::Reg(RegOperand::def(dst, 1))]));
    }

    fn select_float_compare(&mut self, block: Block, data: &InstData) {
        let vals = data.operands.values();
        let (lhs, rhs) = (vals[0], vals[1]);
        let width = self.target.size_of(self.types(), self.operand_ty(lhs).unwrap()) as u8;
        let l = self.reg_of(lhs);
        let r = self.reg_of(rhs);
        let dst = self.value_reg[&data.result.unwrap()];
        let mnemonic = if width == 4 { "ucomiss" } else { "ucomisd" };
        self.emit(block, MachineInst::new(mnemonic, vec![MachineOperand::Reg(RegOperand::use_(r, width)), MachineOperand::Reg(RegOperand::use_(l, width))]));
        let (cc, combine) = float_condition_code(data.opcode);
        self.emit(block, MachineInst::new(setcc_mnemonic(cc), vec![MachineOperand::Reg(RegOperand::def(dst, 1))]));
        match combine {
            FloatCombine::None => {}
            FloatCombine::AndNotParity => {
                let p = self.mf.new_vreg(RegClass::GeneralPurpose);
                self.emit(block, MachineInst::new("setnp", vec![MachineOperand::Reg(RegOperand::def(p, 1))]));
                self.emit(block, MachineInst::new(and_mnemonic(1), vec![MachineOperand::Reg(RegOperand::use_(p, 1)), MachineOperand::Reg(RegOperand::def(dst, 1))]));
            }
            FloatCombine::OrParity => {
                let p = self.mf.new_vreg(RegClass::GeneralPurpose);
                self.emit(block, MachineInst::new("setp", vec![MachineOperand::Reg(RegOperand::def(p, 1))]));
                self.emit(block, MachineInst::new(or_mnemonic(1), vec![MachineOperand::Reg(RegOperand::use_(p, 1)), MachineOperand::Reg(RegOperand::def(dst, 1))]));
            }
        }
    }

    fn select_branch_if(&mut self, block: Block, cond: Value, then_block: Block, else_block: Block) {
        // Fuse with an immediately preceding single-use comparison when possible, skipping the
        // would-be `setcc` in favor of a direct conditional jump.
        if let ValueData::Inst(cmp_inst) = self.values().data(cond) {
            let cmp_data = self.func.inst(cmp_inst).clone();
            if is_comparison(cmp_data.opcode) && self.values().use_count(cond) == 1 {
                let int_cmp = is_int_comparison(cmp_data.opcode);
                let vals = cmp_data.operands.values();
                let (lhs, rhs) = (vals[0], vals[1]);
                let width = self.target.size_of(self.types(), self.operand_ty(lhs).unwrap()) as u8;
                let l = self.reg_of(lhs);
                let r = self.reg_of(rhs);
                if int_cmp {
                    let cc = int_condition_code(cmp_data.opcode);
                    self.emit(block, MachineInst::new(cmp_mnemonic(width), vec![MachineOperand::Reg(RegOperand::use_(r, width)), MachineOperand::Reg(RegOperand::use_(l, width))]));
                    self.lower_phi_copies(block, then_block);
                    self.emit(block, MachineInst::new(jcc_mnemonic(cc), vec![MachineOperand::BlockRef(then_block)]));
                    self.lower_phi_copies(block, else_block);
                    self.emit(block, MachineInst::new("jmp", vec![MachineOperand::BlockRef(else_block)]));
                } else {
                    let mnemonic = if width == 4 { "ucomiss" } else { "ucomisd" };
                    self.emit(block, MachineInst::new(mnemonic, vec![MachineOperand::Reg(RegOperand::use_(r, width)), MachineOperand::Reg(RegOperand::use_(l, width))]));
                    let (cc, combine) = float_condition_code(cmp_data.opcode);
                    match combine {
                        FloatCombine::None => {
                            self.lower_phi_copies(block, then_block);
                            self.emit(block, MachineInst::new(jcc_mnemonic(cc), vec![MachineOperand::BlockRef(then_block)]));
                            self.lower_phi_copies(block, else_block);
                            self.emit(block, MachineInst::new("jmp", vec![MachineOperand::BlockRef(else_block)]));
                        }
                        FloatCombine::AndNotParity => {
                            // Unordered must land in `else`; fold that in ahead of the base
                            // condition so both jumps into `else` share one copy of its phis.
                            self.lower_phi_copies(block, else_block);
                            self.emit(block, MachineInst::new("jp", vec![MachineOperand::BlockRef(else_block)]));
                            self.lower_phi_copies(block, then_block);
                            self.emit(block, MachineInst::new(jcc_mnemonic(cc), vec![MachineOperand::BlockRef(then_block)]));
                            self.emit(block, MachineInst::new("jmp", vec![MachineOperand::BlockRef(else_block)]));
                        }
                        FloatCombine::OrParity => {
                            // Unordered must land in `then`; fold that in ahead of the base
                            // condition so both jumps into `then` share one copy of its phis.
                            self.lower_phi_copies(block, then_block);
                            self.emit(block, MachineInst::new("jp", vec![MachineOperand::BlockRef(then_block)]));
                            self.emit(block, MachineInst::new(jcc_mnemonic(cc), vec![MachineOperand::BlockRef(then_block)]));
                            self.lower_phi_copies(block, else_block);
                            self.emit(block, MachineInst::new("jmp", vec![MachineOperand::BlockRef(else_block)]));
                        }
                    }
                }
                return;
            }
        }
        let c = self.reg_of(cond);
        self.emit(block, MachineInst::new("cmpb", vec![MachineOperand::Imm(0), MachineOperand::Reg(RegOperand::use_(c, 1))]));
        self.lower_phi_copies(block, then_block);
        self.emit(block, MachineInst::new("jne", vec![MachineOperand::BlockRef(then_block)]));
        self.lower_phi_copies(block, else_block);
        self.emit(block, MachineInst::new("jmp", vec![MachineOperand::BlockRef(else_block)]));
    }

    /// Emit a parallel copy into each phi of `succ` that has an operand arriving from `pred`, just
    /// before `pred`'s terminator. A plain sequential ordering suffices here: no phi destination
    /// in this pipeline aliases another phi's source, since SSA construction never produces such
    /// cycles at this granularity.
    fn lower_phi_copies(&mut self, pred: Block, succ: Block) {
        for inst in self.func.block_insts(succ) {
            let data = self.func.inst(inst);
            if !data.is_phi() {
                break;
            }
            let ops = match &data.operands {
                Operands::Phi(ops) => ops.clone(),
                _ => unreachable!(),
            };
            if let Some(op) = ops.iter().find(|op| op.predecessor == pred) {
                let value = op.value;
                let result = self.func.inst_result(inst).unwrap();
                let dst = self.value_reg[&result];
                let ty = self.operand_ty(value).unwrap();
                let width = self.target.size_of(self.types(), ty) as u8;
                let class = reg_class_of(self.types(), ty);
                let src = self.reg_of(value);
                if src != dst {
                    self.emit(pred, mov_reg(class, src, dst, width));
                }
            }
        }
    }

    fn select_call(&mut self, block: Block, data: &InstData) -> CodegenResult<()> {
        let vals = data.operands.values();
        let callee = vals[0];
        let args: Vec<Value> = vals[1..].to_vec();
        let callee_name = match self.values().data(callee) {
            ValueData::Function(f) => self.cfg.function(f).name.clone(),
            ValueData::InlineAsm(_) => "<inline-asm>".to_string(),
            other => panic!("call callee must be a function or inline-asm value, got {other:?}"),
        };
        if args.len() > 6 {
            return Err(CodegenError::TooManyCallArguments { callee: callee_name, got: args.len() });
        }
        let mut int_idx = 0usize;
        let mut fp_idx = 0usize;
        let mut moves = Vec::new();
        for &arg in &args {
            let ty = self.operand_ty(arg).unwrap();
            let width = self.target.size_of(self.types(), ty) as u8;
            let r = self.reg_of(arg);
            if self.types().is_float(ty) {
                let dst = MachineRegister::physical(fp_arg_phys_index(fp_idx));
                fp_idx += 1;
                moves.push(mov_reg(RegClass::FloatingPoint, r, dst, width));
            } else {
                let dst = MachineRegister::physical(phys_index(SYSV_INT_ARG_REGS[int_idx]));
                int_idx += 1;
                moves.push(mov_reg(RegClass::GeneralPurpose, r, dst, width.max(4)));
            }
        }
        // Marshal from the last argument register backward, so an argument value still sitting in
        // an earlier arg register isn't clobbered before it's copied out.
        for mv in moves.into_iter().rev() {
            self.emit(block, mv);
        }
        self.emit(block, MachineInst::new("callq", vec![MachineOperand::SymbolRef(format!("{callee_name}@PLT"))]));
        if let Some(result) = data.result {
            let ty = self.values().ty(result).unwrap();
            let width = self.target.size_of(self.types(), ty) as u8;
            let dst = self.value_reg[&result];
            if self.types().is_float(ty) {
                self.emit(block, mov_reg(RegClass::FloatingPoint, MachineRegister::physical(fp_arg_phys_index(0)), dst, width));
            } else {
                self.emit(block, mov_reg(RegClass::GeneralPurpose, MachineRegister::physical(phys_index(crate::isa::x86::registers::RETURN_INT)), dst, width.max(4)));
            }
        }
        Ok(())
    }
}

fn round_up(value: i64, align: i64) -> i64 {
    if align <= 0 {
        value
    } else {
        (value + align - 1) / align * align
    }
}

fn reg_class_of(types: &crate::ir::TypePool, ty: Type) -> RegClass {
    if types.is_float(ty) {
        RegClass::FloatingPoint
    } else {
        RegClass::GeneralPurpose
    }
}

fn phys_index(reg: PhysReg) -> u32 {
    reg.raw_index()
}

fn fp_arg_phys_index(i: usize) -> u32 {
    PhysReg::Xmm(i as u8).raw_index()
}

fn mov_reg(class: RegClass, src: MachineRegister, dst: MachineRegister, width: u8) -> MachineInst {
    match class {
        RegClass::GeneralPurpose => MachineInst::new(mov_mnemonic(width), vec![MachineOperand::Reg(RegOperand::use_(src, width)), MachineOperand::Reg(RegOperand::def(dst, width))]),
        RegClass::FloatingPoint => {
            let mnemonic = if width == 4 { "movss" } else { "movsd" };
            MachineInst::new(mnemonic, vec![MachineOperand::Reg(RegOperand::use_(src, width)), MachineOperand::Reg(RegOperand::def(dst, width))])
        }
        RegClass::Vector => unreachable!("no vector-class registers are ever materialized"),
    }
}

fn mov_mnemonic(width: u8) -> &'static str {
    match width {
        1 => "movb",
        2 => "movw",
        4 => "movl",
        8 => "movq",
        other => panic!("unsupported operand width {other}"),
    }
}

macro_rules! width_mnemonic {
    ($name:ident, $stem:literal) => {
        fn $name(width: u8) -> &'static str {
            match width {
                1 => concat!($stem, "b"),
                2 => concat!($stem, "w"),
                4 => concat!($stem, "l"),
                8 => concat!($stem, "q"),
                other => panic!("unsupported operand width {other}"),
            }
        }
    };
}

width_mnemonic!(add_mnemonic, "add");
width_mnemonic!(sub_mnemonic, "sub");
width_mnemonic!(imul_mnemonic, "imul");
width_mnemonic!(and_mnemonic, "and");
width_mnemonic!(or_mnemonic, "or");
width_mnemonic!(xor_mnemonic, "xor");
width_mnemonic!(neg_mnemonic, "neg");
width_mnemonic!(not_mnemonic, "not");
width_mnemonic!(shl_mnemonic, "shl");
width_mnemonic!(shr_mnemonic, "shr");
width_mnemonic!(sar_mnemonic, "sar");
width_mnemonic!(idiv_mnemonic, "idiv");
width_mnemonic!(div_mnemonic, "div");
width_mnemonic!(cmp_mnemonic, "cmp");

fn cqo_mnemonic(width: u8) -> &'static str {
    match width {
        1 | 2 => "cwtl",
        4 => "cltd",
        8 => "cqto",
        other => panic!("unsupported operand width {other}"),
    }
}

fn movsx_mnemonic(src_w: u8, dst_w: u8) -> &'static str {
    match (src_w, dst_w) {
        (1, 2) => "movsbw",
        (1, 4) => "movsbl",
        (1, 8) => "movsbq",
        (2, 4) => "movswl",
        (2, 8) => "movswq",
        (4, 8) => "movslq",
        other => panic!("unsupported sign-extension {other:?}"),
    }
}

fn movzx_mnemonic(src_w: u8, dst_w: u8) -> &'static str {
    match (src_w, dst_w) {
        (1, 2) => "movzbw",
        (1, 4) => "movzbl",
        (1, 8) => "movzbq",
        (2, 4) => "movzwl",
        (2, 8) => "movzwq",
        other => panic!("unsupported zero-extension {other:?}"),
    }
}

/// A one- or two-letter x86 condition-code suffix, shared by `setcc`/`jcc` mnemonics.
type Cc = &'static str;

fn int_condition_code(opcode: Opcode) -> Cc {
    match opcode {
        Opcode::CmpIeq => "e",
        Opcode::CmpIne => "ne",
        Opcode::CmpSlt => "l",
        Opcode::CmpSle => "le",
        Opcode::CmpSgt => "g",
        Opcode::CmpSge => "ge",
        Opcode::CmpUlt => "b",
        Opcode::CmpUle => "be",
        Opcode::CmpUgt => "a",
        Opcode::CmpUge => "ae",
        other => panic!("{other:?} is not an integer comparison"),
    }
}

/// Whether a float condition code's bare `setcc`/`jcc` result needs adjusting for NaN operands.
/// `ucomiss`/`ucomisd` raise PF on an unordered (NaN) comparison alongside ZF and CF, which
/// aliases "unordered" onto one of the ordered outcomes for six of the twelve opcodes; the other
/// six already come out right from the bare flags. `AndNotParity` masks the unordered case back
/// out of an ordered predicate; `OrParity` adds it back into an unordered predicate.
enum FloatCombine {
    None,
    AndNotParity,
    OrParity,
}

/// Ordered and unordered IEEE-754 comparisons both read off the flags `ucomiss`/`ucomisd` sets.
/// The returned condition code alone is only correct when the combine mode is `None`; callers
/// must also fold in a `setnp`/`setp` per the combine mode (see `select_float_compare` and the
/// fused branch in `select_branch_if`).
fn float_condition_code(opcode: Opcode) -> (Cc, FloatCombine) {
    match opcode {
        Opcode::CmpOeq => ("e", FloatCombine::AndNotParity),
        Opcode::CmpOne => ("ne", FloatCombine::None),
        Opcode::CmpOlt => ("b", FloatCombine::AndNotParity),
        Opcode::CmpOle => ("be", FloatCombine::AndNotParity),
        Opcode::CmpOgt => ("a", FloatCombine::None),
        Opcode::CmpOge => ("ae", FloatCombine::None),
        Opcode::CmpUneq => ("e", FloatCombine::None),
        Opcode::CmpUnne => ("ne", FloatCombine::OrParity),
        Opcode::CmpUnlt => ("b", FloatCombine::None),
        Opcode::CmpUnle => ("be", FloatCombine::None),
        Opcode::CmpUngt => ("a", FloatCombine::OrParity),
        Opcode::CmpUnge => ("ae", FloatCombine::OrParity),
        other => panic!("{other:?} is not a float comparison"),
    }
}

fn flip_condition(cc: Cc) -> Cc {
    match cc {
        "e" => "e",
        "ne" => "ne",
        "l" => "g",
        "g" => "l",
        "le" => "ge",
        "ge" => "le",
        "b" => "a",
        "a" => "b",
        "be" => "ae",
        "ae" => "be",
        other => panic!("unrecognized condition code {other}"),
    }
}

fn setcc_mnemonic(cc: Cc) -> &'static str {
    match cc {
        "e" => "sete",
        "ne" => "setne",
        "l" => "setl",
        "le" => "setle",
        "g" => "setg",
        "ge" => "setge",
        "b" => "setb",
        "be" => "setbe",
        "a" => "seta",
        "ae" => "setae",
        other => panic!("unrecognized condition code {other}"),
    }
}

fn jcc_mnemonic(cc: Cc) -> &'static str {
    match cc {
        "e" => "je",
        "ne" => "jne",
        "l" => "jl",
        "le" => "jle",
        "g" => "jg",
        "ge" => "jge",
        "b" => "jb",
        "be" => "jbe",
        "a" => "ja",
        "ae" => "jae",
        other => panic!("unrecognized condition code {other}"),
    }
}

fn is_const(values: &ValueGraph, v: Value) -> bool {
    matches!(values.data(v), ValueData::Constant(_))
}

fn is_comparison(opcode: Opcode) -> bool {
    is_int_comparison(opcode) || is_float_comparison(opcode)
}

fn is_int_comparison(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::CmpIeq | Opcode::CmpIne | Opcode::CmpSlt | Opcode::CmpSle | Opcode::CmpSgt | Opcode::CmpSge
            | Opcode::CmpUlt | Opcode::CmpUle | Opcode::CmpUgt | Opcode::CmpUge
    )
}

fn is_float_comparison(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::CmpOeq
            | Opcode::CmpOne
            | Opcode::CmpOlt
            | Opcode::CmpOle
            | Opcode::CmpOgt
            | Opcode::CmpOge
            | Opcode::CmpUneq
            | Opcode::CmpUnne
            | Opcode::CmpUnlt
            | Opcode::CmpUnle
            | Opcode::CmpUngt
            | Opcode::CmpUnge
    )
}

/// Resolve a jump/branch-if block-address operand to the `Block` it targets.
fn block_address_operand(v: Value, values: &ValueGraph, consts: &ConstantPool) -> Block {
    match values.data(v) {
        ValueData::Constant(c) => match consts.data(c) {
            ConstantData::BlockAddress { block } => *block,
            other => panic!("expected a block-address constant, got {other:?}"),
        },
        other => panic!("expected a block-address constant value, got {other:?}"),
    }
}
