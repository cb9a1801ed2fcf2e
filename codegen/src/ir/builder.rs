//! The instruction builder: the single point where IR invariants are established.
//!
//! Mirrors the structure of `cranelift_frontend`'s `FunctionBuilder`/`FuncInstBuilder`: a small
//! struct holding the current insertion block and mode, borrowing the function (plus the type and
//! constant pools it shares with the rest of the translation unit) it builds into. Every `build_*`
//! method validates its operand types, mints a result value when the opcode produces one, and
//! attaches the instruction according to the current mode. If no insertion block has been set,
//! building panics — every instruction in this IR lives in a block, so there is no detached-build
//! use case to support.

use crate::ir::constant::ConstantPool;
use crate::ir::entities::{Block, Const, Inst, Type, Value};
use crate::ir::instruction::{InstExtra, Opcode, Operands, PhiOperand};
use crate::ir::types::TypePool;
use crate::ir::Function;
use smallvec::smallvec;

/// Where new instructions attach relative to the insertion block's existing contents.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InsertMode {
    Append,
    Prepend,
}

/// Builds instructions into a function, one insertion block/mode at a time.
pub struct InstBuilder<'f> {
    func: &'f mut Function,
    types: &'f mut TypePool,
    consts: &'f mut ConstantPool,
    block: Option<Block>,
    mode: InsertMode,
}

impl<'f> InstBuilder<'f> {
    pub fn new(func: &'f mut Function, types: &'f mut TypePool, consts: &'f mut ConstantPool) -> Self {
        Self {
            func,
            types,
            consts,
            block: None,
            mode: InsertMode::Append,
        }
    }

    pub fn set_insertion(&mut self, block: Block, mode: InsertMode) {
        self.block = Some(block);
        self.mode = mode;
    }

    pub fn func(&self) -> &Function {
        self.func
    }

    pub fn func_mut(&mut self) -> &mut Function {
        self.func
    }

    fn current_block(&self) -> Block {
        self.block.expect("no insertion block set on the builder")
    }

    fn insert(&mut self, opcode: Opcode, operands: Operands, ty: Option<Type>, extra: InstExtra) -> Inst {
        let block = self.current_block();
        match self.mode {
            InsertMode::Append => self.func.append_inst(block, opcode, operands, ty, extra),
            InsertMode::Prepend => self.func.prepend_inst(block, opcode, operands, ty, extra),
        }
    }

    fn result_of(&self, inst: Inst) -> Value {
        self.func
            .inst_result(inst)
            .expect("opcode expected to produce a value did not")
    }

    fn value_ty(&self, v: Value) -> Type {
        self.func.values.ty(v).expect("value used in a position requiring a type has none")
    }

    // --- memory ---

    pub fn build_load(&mut self, ptr: Value, loaded_ty: Type, align: u16) -> Value {
        debug_assert!(self.types.is_pointer(self.value_ty(ptr)), "load source must be a pointer");
        let inst = self.insert(Opcode::Load, Operands::Values(smallvec![ptr]), Some(loaded_ty), InstExtra(align));
        self.result_of(inst)
    }

    pub fn build_store(&mut self, ptr: Value, val: Value, align: u16) {
        debug_assert!(self.types.is_pointer(self.value_ty(ptr)), "store destination must be a pointer");
        self.insert(Opcode::Store, Operands::Values(smallvec![ptr, val]), None, InstExtra(align));
    }

    /// `index` is a field index (when `base`'s pointee is a struct) or an element count
    /// (otherwise); the instruction selector decides which based on the pointee type.
    pub fn build_access_ptr(&mut self, base: Value, index: Value, result_ty: Type) -> Value {
        let inst = self.insert(Opcode::AccessPtr, Operands::Values(smallvec![base, index]), Some(result_ty), InstExtra::default());
        self.result_of(inst)
    }

    // --- constants ---

    /// Materialize pooled constant `c` as an SSA value. The `constant` instruction's sole operand
    /// is the pooled constant itself (`Value::Constant`), so instruction selection can recover it
    /// without a side table.
    pub fn build_constant(&mut self, c: Const, ty: Type) -> Value {
        let operand = self.func.constant_value(c, ty);
        let inst = self.insert(Opcode::Constant, Operands::Values(smallvec![operand]), Some(ty), InstExtra::default());
        self.result_of(inst)
    }

    pub fn build_int_constant(&mut self, ty: Type, bits: u64) -> Value {
        let c = self.consts.int(ty, bits);
        self.build_constant(c, ty)
    }

    pub fn build_float_constant(&mut self, ty: Type, bits: u64) -> Value {
        let c = self.consts.float(ty, bits);
        self.build_constant(c, ty)
    }

    /// Materialize a global string. The `string` instruction's sole operand is the pooled string
    /// constant; its result is a pointer to the materialized bytes.
    pub fn build_string(&mut self, bytes: impl Into<Vec<u8>>, ptr_ty: Type) -> Value {
        let c = self.consts.string(bytes);
        let operand = self.func.constant_value(c, ptr_ty);
        let inst = self.insert(Opcode::StringLit, Operands::Values(smallvec![operand]), Some(ptr_ty), InstExtra::default());
        self.result_of(inst)
    }

    fn block_address(&mut self, block: Block, ptr_ty: Type) -> Value {
        let c = self.consts.block_address(block);
        self.func.constant_value(c, ptr_ty)
    }

    // --- control ---

    /// `jump`'s sole operand is a block-address constant naming the destination.
    pub fn build_jump(&mut self, dest: Block, label_ty: Type) {
        let pred = self.current_block();
        let dest_operand = self.block_address(dest, label_ty);
        self.insert(Opcode::Jump, Operands::Values(smallvec![dest_operand]), None, InstExtra::default());
        self.func.connect(pred, dest);
    }

    /// `branch-if` takes the `i1` condition plus two block-address operands (then, else).
    pub fn build_branch_if(&mut self, cond: Value, then_block: Block, else_block: Block, label_ty: Type) {
        let pred = self.current_block();
        let then_operand = self.block_address(then_block, label_ty);
        let else_operand = self.block_address(else_block, label_ty);
        self.insert(
            Opcode::BranchIf,
            Operands::Values(smallvec![cond, then_operand, else_operand]),
            None,
            InstExtra::default(),
        );
        self.func.connect(pred, then_block);
        self.func.connect(pred, else_block);
    }

    pub fn build_return(&mut self, val: Option<Value>) {
        let operands = match val {
            Some(v) => smallvec![v],
            None => smallvec![],
        };
        self.insert(Opcode::Return, Operands::Values(operands), None, InstExtra::default());
    }

    pub fn build_abort(&mut self) {
        self.insert(Opcode::Abort, Operands::Values(smallvec![]), None, InstExtra::default());
    }

    pub fn build_unreachable(&mut self) {
        self.insert(Opcode::Unreachable, Operands::Values(smallvec![]), None, InstExtra::default());
    }

    /// Insert an empty phi (no operands yet) at the front of `block`. Used by the SSA
    /// construction pass, which fills operands in once all of the block's predecessors are known.
    pub fn build_empty_phi(&mut self, block: Block, ty: Type) -> Value {
        let saved_block = self.block;
        let saved_mode = self.mode;
        self.block = Some(block);
        self.mode = InsertMode::Prepend;
        let inst = self.insert(Opcode::Phi, Operands::Phi(Vec::new()), Some(ty), InstExtra::default());
        self.block = saved_block;
        self.mode = saved_mode;
        self.result_of(inst)
    }

    pub fn add_phi_operand(&mut self, phi_inst: Inst, predecessor: Block, value: Value) {
        match &mut self.func.inst_mut(phi_inst).operands {
            Operands::Phi(ops) => ops.push(PhiOperand { predecessor, value }),
            Operands::Values(_) => panic!("add_phi_operand called on a non-phi instruction"),
        }
        self.func.values.add_use(value, phi_inst);
    }

    // --- calls ---

    pub fn build_call(&mut self, callee: Value, args: &[Value], ret_ty: Option<Type>) -> Option<Value> {
        let mut operands = smallvec![callee];
        operands.extend(args.iter().copied());
        let inst = self.insert(Opcode::Call, Operands::Values(operands), ret_ty, InstExtra::default());
        self.func.inst_result(inst)
    }

    // --- arithmetic / bitwise / shift / conversions / comparisons ---

    /// Generic two-operand instruction: every arithmetic, bitwise, shift, and comparison opcode
    /// routes through here; callers supply the opcode and result type (`i1` for comparisons).
    pub fn build_binary(&mut self, opcode: Opcode, lhs: Value, rhs: Value, result_ty: Type) -> Value {
        let inst = self.insert(opcode, Operands::Values(smallvec![lhs, rhs]), Some(result_ty), InstExtra::default());
        self.result_of(inst)
    }

    /// Generic one-operand instruction: negation and all conversion opcodes.
    pub fn build_unary(&mut self, opcode: Opcode, operand: Value, result_ty: Type) -> Value {
        let inst = self.insert(opcode, Operands::Values(smallvec![operand]), Some(result_ty), InstExtra::default());
        self.result_of(inst)
    }

    pub fn build_select(&mut self, cond: Value, t: Value, f: Value, result_ty: Type) -> Value {
        let inst = self.insert(Opcode::Select, Operands::Values(smallvec![cond, t, f]), Some(result_ty), InstExtra::default());
        self.result_of(inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::Signature;

    #[test]
    fn jump_and_branch_wire_cfg_edges() {
        let mut types = TypePool::new();
        let mut consts = ConstantPool::new();
        let mut func = Function::new("f", Signature { params: vec![], ret: None });
        let label = types.pointer(types.int(8));
        let entry = func.create_block();
        let then_block = func.create_block();
        let else_block = func.create_block();
        let join = func.create_block();

        let i1 = types.int(1);
        {
            let mut b = InstBuilder::new(&mut func, &mut types, &mut consts);
            b.set_insertion(entry, InsertMode::Append);
            let cond = b.build_int_constant(i1, 1);
            b.build_branch_if(cond, then_block, else_block, label);

            b.set_insertion(then_block, InsertMode::Append);
            b.build_jump(join, label);

            b.set_insertion(else_block, InsertMode::Append);
            b.build_jump(join, label);
        }

        assert_eq!(func.block(entry).succs, vec![then_block, else_block]);
        assert_eq!(func.block(join).preds, vec![then_block, else_block]);
    }
}
