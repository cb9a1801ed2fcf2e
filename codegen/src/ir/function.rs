//! A function: blocks, arguments, locals, and the instruction/value arenas that back them.

use crate::ir::block::BasicBlock;
use crate::ir::entities::{Argument, Block, Const, Inst, Local, Type, Value};
use crate::ir::global::Linkage;
use crate::ir::instruction::{InstData, InstExtra, Opcode, Operands};
use crate::ir::value::{ValueData, ValueGraph};
use entity::{PrimaryMap, SecondaryMap};
use std::collections::HashMap;
use std::fmt;

/// A function's argument and return types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Option<Type>,
}

#[derive(Clone, Debug)]
struct ArgumentData {
    ty: Type,
}

#[derive(Clone, Debug)]
struct LocalData {
    name: String,
    /// The type of the value stored in the local. The local's own `Value` is always
    /// pointer-typed to this.
    allocated_ty: Type,
    align: u32,
}

/// A function: an ordered, doubly-linked list of [`BasicBlock`]s, its arguments, its locals, and
/// the arenas (instructions, values) everything inside it indexes into.
pub struct Function {
    pub name: String,
    pub sig: Signature,
    /// Whether this function's symbol is visible outside its translation unit. A function with
    /// no blocks is a declaration only (an external symbol referenced but not defined here) and
    /// is never selected.
    pub linkage: Linkage,

    blocks: PrimaryMap<Block, BasicBlock>,
    blocks_head: Option<Block>,
    blocks_tail: Option<Block>,

    insts: PrimaryMap<Inst, InstData>,

    pub values: ValueGraph,

    arguments: PrimaryMap<Argument, ArgumentData>,
    argument_values: Vec<Value>,

    locals: PrimaryMap<Local, LocalData>,
    locals_by_name: HashMap<String, Local>,
    local_values: SecondaryMap<Local, Option<Value>>,

    /// Caches the single `Value` wrapping each pooled constant this function has materialized,
    /// so repeated references to the same constant share one `Value::Constant` rather than
    /// minting a fresh one (and a fresh def-use entry) each time.
    constant_values: HashMap<Const, Value>,
}

impl Function {
    pub fn new(name: impl Into<String>, sig: Signature) -> Self {
        let mut f = Function {
            name: name.into(),
            sig: sig.clone(),
            linkage: Linkage::External,
            blocks: PrimaryMap::new(),
            blocks_head: None,
            blocks_tail: None,
            insts: PrimaryMap::new(),
            values: ValueGraph::new(),
            arguments: PrimaryMap::new(),
            argument_values: Vec::new(),
            locals: PrimaryMap::new(),
            locals_by_name: HashMap::new(),
            local_values: SecondaryMap::new(),
            constant_values: HashMap::new(),
        };
        for &ty in &sig.params {
            let arg = f.arguments.push(ArgumentData { ty });
            let value = f.values.make(ValueData::Argument(arg), Some(ty));
            f.argument_values.push(value);
        }
        f
    }

    // --- arguments ---

    pub fn argument_value(&self, index: usize) -> Value {
        self.argument_values[index]
    }

    pub fn argument_count(&self) -> usize {
        self.argument_values.len()
    }

    // --- locals ---

    /// Declare a new local (stack slot) of `allocated_ty`, returning the pointer-typed `Value`
    /// that refers to it.
    pub fn declare_local(&mut self, name: impl Into<String>, allocated_ty: Type, align: u32, ptr_ty: Type) -> Value {
        let name = name.into();
        let local = self.locals.push(LocalData {
            name: name.clone(),
            allocated_ty,
            align,
        });
        self.locals_by_name.insert(name, local);
        let value = self.values.make(ValueData::Local(local), Some(ptr_ty));
        self.local_values[local] = Some(value);
        value
    }

    pub fn local_by_name(&self, name: &str) -> Option<Local> {
        self.locals_by_name.get(name).copied()
    }

    pub fn local_value(&self, local: Local) -> Value {
        self.local_values[local].expect("local declared without a value")
    }

    pub fn local_allocated_ty(&self, local: Local) -> Type {
        self.locals[local].allocated_ty
    }

    pub fn local_align(&self, local: Local) -> u32 {
        self.locals[local].align
    }

    pub fn local_name(&self, local: Local) -> &str {
        &self.locals[local].name
    }

    /// Remove a local's arena entry's bookkeeping after the SSA pass promotes it away. The local
    /// itself still exists as a dead arena slot (entity indices are never reused); callers should
    /// treat `locals_in_declaration_order` as authoritative only alongside a liveness check.
    pub fn forget_local(&mut self, local: Local) {
        self.local_values[local] = None;
    }

    pub fn locals_in_declaration_order(&self) -> impl Iterator<Item = Local> + '_ {
        self.locals.keys()
    }

    /// The `Value` wrapping pooled constant `c`, minting one the first time it's referenced by
    /// this function.
    pub fn constant_value(&mut self, c: Const, ty: Type) -> Value {
        *self
            .constant_values
            .entry(c)
            .or_insert_with(|| self.values.make(ValueData::Constant(c), Some(ty)))
    }

    // --- blocks ---

    pub fn create_block(&mut self) -> Block {
        let block = self.blocks.push(BasicBlock::default());
        match self.blocks_tail {
            None => {
                self.blocks_head = Some(block);
                self.blocks_tail = Some(block);
            }
            Some(tail) => {
                self.blocks[tail].next = Some(block);
                self.blocks[block].prev = Some(tail);
                self.blocks_tail = Some(block);
            }
        }
        block
    }

    pub fn entry_block(&self) -> Option<Block> {
        self.blocks_head
    }

    /// A function with no blocks is a declaration only: an external symbol referenced (e.g. as a
    /// call callee) but defined in another translation unit.
    pub fn is_declaration(&self) -> bool {
        self.blocks_head.is_none()
    }

    pub fn is_entry_block(&self, block: Block) -> bool {
        self.blocks_head == Some(block)
    }

    pub fn block(&self, block: Block) -> &BasicBlock {
        &self.blocks[block]
    }

    pub fn block_mut(&mut self, block: Block) -> &mut BasicBlock {
        &mut self.blocks[block]
    }

    /// Iterate blocks in their declared (layout) order.
    pub fn blocks_in_layout_order(&self) -> Vec<Block> {
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut cur = self.blocks_head;
        while let Some(b) = cur {
            order.push(b);
            cur = self.blocks[b].next;
        }
        order
    }

    /// Record that `pred` falls through to / jumps to `succ`, keeping both edge lists in sync.
    pub fn connect(&mut self, pred: Block, succ: Block) {
        if !self.blocks[pred].succs.contains(&succ) {
            self.blocks[pred].succs.push(succ);
        }
        if !self.blocks[succ].preds.contains(&pred) {
            self.blocks[succ].preds.push(pred);
        }
    }

    // --- instructions ---

    pub fn inst(&self, inst: Inst) -> &InstData {
        &self.insts[inst]
    }

    pub fn inst_mut(&mut self, inst: Inst) -> &mut InstData {
        &mut self.insts[inst]
    }

    pub fn inst_result(&self, inst: Inst) -> Option<Value> {
        self.insts[inst].result
    }

    fn link_use_list(&mut self, inst: Inst) {
        let referenced = self.insts[inst].operands.referenced_values();
        for v in referenced {
            self.values.add_use(v, inst);
        }
    }

    fn unlink_use_list(&mut self, inst: Inst) {
        let referenced = self.insts[inst].operands.referenced_values();
        for v in referenced {
            self.values.remove_use(v, inst);
        }
    }

    /// Append a new instruction to the end of `block`, wiring its use-list edges and (if it
    /// produces a value) minting a fresh result `Value`.
    pub fn append_inst(
        &mut self,
        block: Block,
        opcode: Opcode,
        operands: Operands,
        ty: Option<Type>,
        extra: InstExtra,
    ) -> Inst {
        let inst = self.alloc_inst(block, opcode, operands, ty, extra);
        let tail = self.blocks[block].insts_tail;
        self.insts[inst].prev = tail;
        match tail {
            Some(t) => self.insts[t].next = Some(inst),
            None => self.blocks[block].insts_head = Some(inst),
        }
        self.blocks[block].insts_tail = Some(inst);
        inst
    }

    /// Prepend a new instruction to the start of `block` (used for phi insertion).
    pub fn prepend_inst(
        &mut self,
        block: Block,
        opcode: Opcode,
        operands: Operands,
        ty: Option<Type>,
        extra: InstExtra,
    ) -> Inst {
        let inst = self.alloc_inst(block, opcode, operands, ty, extra);
        let head = self.blocks[block].insts_head;
        self.insts[inst].next = head;
        match head {
            Some(h) => self.insts[h].prev = Some(inst),
            None => self.blocks[block].insts_tail = Some(inst),
        }
        self.blocks[block].insts_head = Some(inst);
        inst
    }

    fn alloc_inst(
        &mut self,
        block: Block,
        opcode: Opcode,
        operands: Operands,
        ty: Option<Type>,
        extra: InstExtra,
    ) -> Inst {
        let inst = self.insts.push(InstData {
            opcode,
            operands,
            result: None,
            ty,
            extra,
            block,
            prev: None,
            next: None,
        });
        if let Some(ty) = ty {
            let result = self.values.make(ValueData::Inst(inst), Some(ty));
            self.insts[inst].result = Some(result);
        }
        self.link_use_list(inst);
        inst
    }

    /// Unlink `inst` from its block's instruction list and drop its use-list edges. The caller
    /// (trivial DCE, the SSA pass) must ensure `inst`'s result has no remaining uses first.
    pub fn remove_inst(&mut self, inst: Inst) {
        debug_assert!(
            self.insts[inst]
                .result
                .map(|r| self.values.has_no_uses(r))
                .unwrap_or(true),
            "removing an instruction whose result still has uses"
        );
        self.unlink_use_list(inst);
        let block = self.insts[inst].block;
        let prev = self.insts[inst].prev;
        let next = self.insts[inst].next;
        match prev {
            Some(p) => self.insts[p].next = next,
            None => self.blocks[block].insts_head = next,
        }
        match next {
            Some(n) => self.insts[n].prev = prev,
            None => self.blocks[block].insts_tail = prev,
        }
    }

    /// Iterate a block's instructions in layout order.
    pub fn block_insts(&self, block: Block) -> Vec<Inst> {
        let mut order = Vec::new();
        let mut cur = self.blocks[block].insts_head;
        while let Some(i) = cur {
            order.push(i);
            cur = self.insts[i].next;
        }
        order
    }

    pub fn first_inst(&self, block: Block) -> Option<Inst> {
        self.blocks[block].insts_head
    }

    /// Replace every use of `old` with `new` across the function, rewriting each using
    /// instruction's operand slots in place. This is the fundamental IR rewrite primitive.
    pub fn replace_all_uses_with(&mut self, old: Value, new: Value) {
        if old == new {
            return;
        }
        let users = self.values.users(old);
        for inst in users {
            let mut removed = 0usize;
            let mut added = 0usize;
            match &mut self.insts[inst].operands {
                Operands::Values(vals) => {
                    for slot in vals.iter_mut() {
                        if *slot == old {
                            *slot = new;
                            removed += 1;
                            added += 1;
                        }
                    }
                }
                Operands::Phi(ops) => {
                    for op in ops.iter_mut() {
                        if op.value == old {
                            op.value = new;
                            removed += 1;
                            added += 1;
                        }
                    }
                }
            }
            for _ in 0..removed {
                self.values.remove_use(old, inst);
            }
            for _ in 0..added {
                self.values.add_use(new, inst);
            }
        }
    }
}

/// A plain textual rendering for `--dump-siir`: one line per instruction, referencing values,
/// blocks, and locals by their entity-index names rather than resolving types or constants.
impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "function {}(", self.name)?;
        for (i, &arg) in self.argument_values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        writeln!(f, ") {{")?;
        for block in self.blocks_in_layout_order() {
            writeln!(f, "{block}:")?;
            for inst in self.block_insts(block) {
                let data = self.inst(inst);
                write!(f, "    ")?;
                if let Some(result) = data.result {
                    write!(f, "{result} = ")?;
                }
                write!(f, "{:?}", data.opcode)?;
                match &data.operands {
                    Operands::Values(vals) => {
                        for v in vals {
                            write!(f, " {v}")?;
                        }
                    }
                    Operands::Phi(ops) => {
                        for op in ops {
                            write!(f, " [{} -> {}]", op.predecessor, op.value)?;
                        }
                    }
                }
                writeln!(f)?;
            }
        }
        writeln!(f, "}}")
    }
}
