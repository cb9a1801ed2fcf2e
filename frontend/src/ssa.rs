//! mem2reg SSA construction, after Braun, Buchwald, Hack, Leißa, Mallon, and Zwinkau: locals are
//! promoted to SSA values without ever materializing a dominance frontier, by resolving reads
//! lazily and patching incomplete phis in as their blocks seal.
//!
//! A local is only a candidate if its address never escapes: every use of its pointer value must
//! be the direct source operand of a `load` or the direct destination operand of a `store`. A
//! local passed to `access-ptr`, `reinterpret`, a call, or stored as some other local's *value*
//! operand keeps its stack slot.

use codegen::ir::{Block, Cfg, Function, Inst, Local, Opcode, Operands, Value, ValueData};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Promote every eligible local in every function of `cfg` to SSA values.
pub fn promote_locals(cfg: &mut Cfg) {
    let funcs: Vec<_> = cfg.functions().map(|(f, _)| f).collect();
    for f in funcs {
        let (func, types, consts) = cfg.function_and_pools(f);
        run_function(func, types, consts);
    }
}

fn run_function(
    func: &mut Function,
    types: &mut codegen::ir::TypePool,
    consts: &mut codegen::ir::ConstantPool,
) {
    if func.is_declaration() {
        return;
    }
    let locals: Vec<Local> = func.locals_in_declaration_order().collect();
    for local in locals {
        let local_value = func.local_value(local);
        if !is_promotable(func, local_value) {
            continue;
        }
        debug!("ssa: promoting local `{}` in `{}`", func.local_name(local), func.name);
        let mut promoter = LocalPromoter {
            func,
            types,
            consts,
            local,
            current_def: HashMap::new(),
            visited: HashSet::new(),
            sealed: HashSet::new(),
            incomplete_phis: HashMap::new(),
        };
        promoter.run();
        func.forget_local(local);
    }
}

/// A local is promotable only if every use of its pointer value is a direct load source or store
/// destination — never an address passed elsewhere (`access-ptr`, `reinterpret`, a call argument,
/// or the *value* side of some other store).
fn is_promotable(func: &Function, local_value: Value) -> bool {
    for inst in func.values.users(local_value) {
        let data = func.inst(inst);
        let Operands::Values(vals) = &data.operands else {
            return false;
        };
        match data.opcode {
            Opcode::Load if vals.len() == 1 && vals[0] == local_value => {}
            Opcode::Store if vals.len() == 2 && vals[0] == local_value && vals[1] != local_value => {}
            _ => return false,
        }
    }
    true
}

/// Per-local SSA construction state, following the standard Braun et al. bookkeeping:
/// `current_def` tracks the reaching definition per block, `incomplete_phis` holds phis inserted
/// for a not-yet-sealed block awaiting their operands, and `sealed` marks blocks whose predecessor
/// set is final.
struct LocalPromoter<'f> {
    func: &'f mut Function,
    types: &'f mut codegen::ir::TypePool,
    consts: &'f mut codegen::ir::ConstantPool,
    local: Local,
    current_def: HashMap<Block, Value>,
    visited: HashSet<Block>,
    sealed: HashSet<Block>,
    incomplete_phis: HashMap<Block, Vec<Inst>>,
}

impl<'f> LocalPromoter<'f> {
    fn run(&mut self) {
        let local_value = self.func.local_value(self.local);
        let rpo = compute_rpo(self.func);

        for &block in &rpo {
            let mut to_remove = Vec::new();
            for inst in self.func.block_insts(block) {
                let data = self.func.inst(inst);
                let vals = data.operands.values().clone();
                match data.opcode {
                    Opcode::Load if vals.first() == Some(&local_value) => {
                        let replacement = self.read_variable(block);
                        if let Some(result) = self.func.inst_result(inst) {
                            self.func.replace_all_uses_with(result, replacement);
                        }
                        to_remove.push(inst);
                    }
                    Opcode::Store if vals.first() == Some(&local_value) => {
                        self.write_variable(block, vals[1]);
                        to_remove.push(inst);
                    }
                    _ => {}
                }
            }
            for inst in to_remove {
                self.func.remove_inst(inst);
            }

            self.visited.insert(block);

            // A block seals the moment every one of its predecessors has been visited; sweep the
            // whole RPO each time since sealing one block can unblock another later in the order
            // (loop headers seal on their back edge's source, which always comes later in RPO).
            for &candidate in &rpo {
                if self.sealed.contains(&candidate) {
                    continue;
                }
                let preds = self.func.block(candidate).preds.clone();
                if preds.iter().all(|p| self.visited.contains(p)) {
                    self.seal_block(candidate);
                }
            }
        }
    }

    fn write_variable(&mut self, block: Block, value: Value) {
        self.current_def.insert(block, value);
    }

    fn read_variable(&mut self, block: Block) -> Value {
        if let Some(&v) = self.current_def.get(&block) {
            return v;
        }
        self.read_variable_recursive(block)
    }

    fn read_variable_recursive(&mut self, block: Block) -> Value {
        if !self.sealed.contains(&block) {
            let phi_value = self.new_phi(block);
            let phi_inst = self.inst_of(phi_value);
            self.incomplete_phis.entry(block).or_default().push(phi_inst);
            self.write_variable(block, phi_value);
            return phi_value;
        }

        let preds = self.func.block(block).preds.clone();
        if preds.len() == 1 {
            let v = self.read_variable(preds[0]);
            self.write_variable(block, v);
            return v;
        }

        let phi_value = self.new_phi(block);
        let phi_inst = self.inst_of(phi_value);
        self.write_variable(block, phi_value);
        let v = self.add_phi_operands(phi_inst, phi_value, block);
        self.write_variable(block, v);
        v
    }

    fn new_phi(&mut self, block: Block) -> Value {
        let ty = self.func.local_allocated_ty(self.local);
        let mut b = codegen::ir::InstBuilder::new(self.func, self.types, self.consts);
        b.build_empty_phi(block, ty)
    }

    fn inst_of(&self, value: Value) -> Inst {
        match self.func.values.data(value) {
            ValueData::Inst(i) => i,
            other => panic!("expected an instruction-result value, got {other:?}"),
        }
    }

    fn add_phi_operands(&mut self, phi_inst: Inst, phi_value: Value, block: Block) -> Value {
        let preds = self.func.block(block).preds.clone();
        for pred in preds {
            let value = self.read_variable(pred);
            let mut b = codegen::ir::InstBuilder::new(self.func, self.types, self.consts);
            b.add_phi_operand(phi_inst, pred, value);
        }
        self.try_remove_trivial_phi(phi_inst, phi_value)
    }

    /// Replace a phi whose operands, ignoring self-references, all agree on one value, with that
    /// value — recursively, since doing so can make a phi that uses this one trivial in turn.
    fn try_remove_trivial_phi(&mut self, phi_inst: Inst, phi_value: Value) -> Value {
        let ops = match &self.func.inst(phi_inst).operands {
            Operands::Phi(ops) => ops.clone(),
            Operands::Values(_) => panic!("try_remove_trivial_phi called on a non-phi instruction"),
        };

        let mut same: Option<Value> = None;
        for op in &ops {
            if Some(op.value) == same || op.value == phi_value {
                continue;
            }
            if same.is_some() {
                return phi_value;
            }
            same = Some(op.value);
        }
        let same = same.expect("phi sealed with no incoming operands");

        let other_users: Vec<Inst> = self
            .func
            .values
            .users(phi_value)
            .into_iter()
            .filter(|&u| u != phi_inst)
            .collect();

        self.func.replace_all_uses_with(phi_value, same);
        for def in self.current_def.values_mut() {
            if *def == phi_value {
                *def = same;
            }
        }
        self.func.remove_inst(phi_inst);

        for user in other_users {
            if self.func.inst(user).is_phi() {
                if let Some(user_value) = self.func.inst_result(user) {
                    self.try_remove_trivial_phi(user, user_value);
                }
            }
        }

        same
    }

    fn seal_block(&mut self, block: Block) {
        let phis = self.incomplete_phis.remove(&block).unwrap_or_default();
        for phi_inst in phis {
            let phi_value = self
                .func
                .inst_result(phi_inst)
                .expect("phi instruction always produces a value");
            self.add_phi_operands(phi_inst, phi_value, block);
        }
        self.sealed.insert(block);
    }
}

/// Reverse postorder over the function's blocks, reachable from the entry block. Unreachable
/// blocks (dead code the front end emitted but nothing branches to) are simply never visited;
/// locals read only on unreachable paths never get a reaching definition, which is fine since
/// nothing executes those loads.
fn compute_rpo(func: &Function) -> Vec<Block> {
    let Some(entry) = func.entry_block() else {
        return Vec::new();
    };

    let mut postorder = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(Block, usize)> = vec![(entry, 0)];
    visited.insert(entry);

    while let Some(&mut (block, ref mut next_succ)) = stack.last_mut() {
        let succs = func.block(block).succs.clone();
        if *next_succ < succs.len() {
            let succ = succs[*next_succ];
            *next_succ += 1;
            if visited.insert(succ) {
                stack.push((succ, 0));
            }
        } else {
            postorder.push(block);
            stack.pop();
        }
    }

    postorder.reverse();
    postorder
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegen::ir::builder::InsertMode;
    use codegen::ir::{InstBuilder, Signature};
    use codegen::target::Target;

    fn new_cfg() -> Cfg {
        Cfg::new("t.cr", Target::x86_64_linux_systemv())
    }

    #[test]
    fn straight_line_store_then_load_becomes_a_direct_value() {
        let mut cfg = new_cfg();
        let i64 = cfg.types.int(64);
        let ptr_ty = cfg.types.pointer(i64);
        let mut func = Function::new("f", Signature { params: vec![], ret: Some(i64) });
        let entry = func.create_block();
        func.declare_local("x", i64, 8, ptr_ty);
        let local = func.local_by_name("x").unwrap();
        {
            let mut b = InstBuilder::new(&mut func, &mut cfg.types, &mut cfg.constants);
            b.set_insertion(entry, InsertMode::Append);
            let forty_two = b.build_int_constant(i64, 42);
            let ptr = b.func().local_value(local);
            b.build_store(ptr, forty_two, 8);
            let ptr = b.func().local_value(local);
            let loaded = b.build_load(ptr, i64, 8);
            b.build_return(Some(loaded));
        }
        let f = cfg.declare_function(func);

        let (func, types, consts) = cfg.function_and_pools(f);
        super::run_function(func, types, consts);

        assert!(!func.is_declaration());
        for block in func.blocks_in_layout_order() {
            for inst in func.block_insts(block) {
                assert_ne!(func.inst(inst).opcode, Opcode::Load);
                assert_ne!(func.inst(inst).opcode, Opcode::Store);
            }
        }
    }

    #[test]
    fn diamond_merge_inserts_a_phi() {
        let mut cfg = new_cfg();
        let i64 = cfg.types.int(64);
        let i1 = cfg.types.int(1);
        let ptr_ty = cfg.types.pointer(i64);
        let i8 = cfg.types.int(8);
        let label = cfg.types.pointer(i8);
        let mut func = Function::new("f", Signature { params: vec![], ret: Some(i64) });
        let entry = func.create_block();
        let then_block = func.create_block();
        let else_block = func.create_block();
        let join = func.create_block();
        func.declare_local("x", i64, 8, ptr_ty);
        let local = func.local_by_name("x").unwrap();

        {
            let mut b = InstBuilder::new(&mut func, &mut cfg.types, &mut cfg.constants);
            b.set_insertion(entry, InsertMode::Append);
            let cond = b.build_int_constant(i1, 1);
            b.build_branch_if(cond, then_block, else_block, label);

            b.set_insertion(then_block, InsertMode::Append);
            let one = b.build_int_constant(i64, 1);
            let ptr = b.func().local_value(local);
            b.build_store(ptr, one, 8);
            b.build_jump(join, label);

            b.set_insertion(else_block, InsertMode::Append);
            let two = b.build_int_constant(i64, 2);
            let ptr = b.func().local_value(local);
            b.build_store(ptr, two, 8);
            b.build_jump(join, label);

            b.set_insertion(join, InsertMode::Append);
            let ptr = b.func().local_value(local);
            let loaded = b.build_load(ptr, i64, 8);
            b.build_return(Some(loaded));
        }
        let f = cfg.declare_function(func);

        let (func, types, consts) = cfg.function_and_pools(f);
        super::run_function(func, types, consts);

        let phi_count = func
            .block_insts(join)
            .into_iter()
            .filter(|&i| func.inst(i).is_phi())
            .count();
        assert_eq!(phi_count, 1);
    }

    #[test]
    fn address_taken_local_is_not_promotable() {
        let mut cfg = new_cfg();
        let i64 = cfg.types.int(64);
        let ptr_ty = cfg.types.pointer(i64);
        let mut func = Function::new("f", Signature { params: vec![], ret: Some(ptr_ty) });
        let entry = func.create_block();
        func.declare_local("x", i64, 8, ptr_ty);
        let local = func.local_by_name("x").unwrap();
        {
            let mut b = InstBuilder::new(&mut func, &mut cfg.types, &mut cfg.constants);
            b.set_insertion(entry, InsertMode::Append);
            let ptr = b.func().local_value(local);
            b.build_return(Some(ptr));
        }

        let local_value = func.local_value(local);
        assert!(!is_promotable(&func, local_value));
    }

    #[test]
    fn local_stored_as_another_store_s_value_is_not_promotable() {
        let mut cfg = new_cfg();
        let i64 = cfg.types.int(64);
        let ptr_ty = cfg.types.pointer(i64);
        let pp_ty = cfg.types.pointer(ptr_ty);
        let mut func = Function::new("f", Signature { params: vec![], ret: None });
        let entry = func.create_block();
        func.declare_local("x", i64, 8, ptr_ty);
        let x = func.local_by_name("x").unwrap();
        func.declare_local("p", ptr_ty, 8, pp_ty);
        let p = func.local_by_name("p").unwrap();
        {
            let mut b = InstBuilder::new(&mut func, &mut cfg.types, &mut cfg.constants);
            b.set_insertion(entry, InsertMode::Append);
            let x_ptr = b.func().local_value(x);
            let p_ptr = b.func().local_value(p);
            b.build_store(p_ptr, x_ptr, 8);
            b.build_return(None);
        }

        let x_value = func.local_value(x);
        assert!(!is_promotable(&func, x_value));
    }
}
