//! Trivial dead-code elimination: removes side-effect-free, unused instructions to a fixed point.

use crate::ir::{Cfg, Function};
use log::debug;

/// Run trivial DCE over every function in `cfg`.
pub fn run(cfg: &mut Cfg) {
    for (_, func) in cfg.functions_mut() {
        run_function(func);
    }
}

fn run_function(func: &mut Function) {
    loop {
        let mut to_remove = Vec::new();
        for block in func.blocks_in_layout_order() {
            for inst in func.block_insts(block) {
                let data = func.inst(inst);
                if data.opcode.has_side_effects() {
                    continue;
                }
                if data.result.map(|r| func.values.has_no_uses(r)).unwrap_or(true) {
                    to_remove.push(inst);
                }
            }
        }
        if to_remove.is_empty() {
            break;
        }
        debug!("dce: removing {} dead instruction(s) from `{}`", to_remove.len(), func.name);
        for inst in to_remove {
            func.remove_inst(inst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::{InsertMode, InstBuilder};
    use crate::ir::function::Signature;

    #[test]
    fn removes_unused_pure_instruction() {
        let mut func = Function::new("f", Signature { params: vec![], ret: None });
        let mut types = crate::ir::TypePool::new();
        let mut consts = crate::ir::ConstantPool::new();
        let i64 = types.int(64);
        let entry = func.create_block();
        {
            let mut b = InstBuilder::new(&mut func, &mut types, &mut consts);
            b.set_insertion(entry, InsertMode::Append);
            let a = b.build_int_constant(i64, 1);
            let bb = b.build_int_constant(i64, 2);
            b.build_binary(crate::ir::Opcode::Iadd, a, bb, i64);
            b.build_return(None);
        }
        assert_eq!(func.block_insts(entry).len(), 4);
        run_function(&mut func);
        // The unused `iadd` (and the two constants that fed only it) are all dead in sequence.
        assert_eq!(func.block_insts(entry).len(), 1);
    }
}
