//! Basic blocks: an intrusive, doubly-linked instruction list plus CFG edges.

use crate::ir::entities::{Block, Inst};

/// A basic block: an ordered run of instructions (the last of which, once the block is
/// complete, must be a terminator), plus the predecessor/successor lists that make up the CFG
/// directly rather than through a side table.
#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    pub(crate) insts_head: Option<Inst>,
    pub(crate) insts_tail: Option<Inst>,
    pub preds: Vec<Block>,
    pub succs: Vec<Block>,
    pub(crate) prev: Option<Block>,
    pub(crate) next: Option<Block>,
}

impl BasicBlock {
    pub fn is_empty(&self) -> bool {
        self.insts_head.is_none()
    }
}
