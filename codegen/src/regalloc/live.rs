//! Live-range construction: backward per-block dataflow over virtual registers, feeding the
//! linear-scan allocator one contiguous interval per register.
//!
//! This is a conservative approximation of true lifetime-hole-aware liveness: a register's range
//! spans from its earliest live point to its latest, even across a loop body that doesn't
//! reference it in between. `linear_scan` only ever needs "is this register free over
//! `[start, end]`", so a single contiguous interval per register is sufficient for a first
//! allocation pass with no lifetime splitting.

use crate::ir::{Block, Function};
use crate::isa::mir::{MachineBlock, MachineFunction, MachineOperand, MachineRegister};
use crate::isa::x86::registers::RegClass;
use std::collections::{HashMap, HashSet};

/// The positional range in which a virtual register is live, in program-point units (one unit
/// per machine instruction, numbered in block-layout order starting at 0).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveRange {
    pub reg: MachineRegister,
    pub class: RegClass,
    pub start: u32,
    pub end: u32,
}

/// Build one [`LiveRange`] per distinct virtual register referenced in `mf`, sorted by start
/// position (the order [`crate::regalloc::linear_scan`] processes them in).
pub fn compute_live_ranges(func: &Function, mf: &MachineFunction) -> Vec<LiveRange> {
    let blocks: Vec<Block> = mf.blocks.iter().map(|(b, _)| *b).collect();

    let mut block_start = HashMap::new();
    let mut block_end = HashMap::new();
    let mut pos = 0u32;
    for (block, mb) in &mf.blocks {
        let start = pos;
        let len = mb.insts.len() as u32;
        pos += len.max(1);
        block_start.insert(*block, start);
        block_end.insert(*block, pos - 1);
    }

    let mut gen: HashMap<Block, HashSet<MachineRegister>> = HashMap::new();
    let mut kill: HashMap<Block, HashSet<MachineRegister>> = HashMap::new();
    for (block, mb) in &mf.blocks {
        let (g, k) = local_gen_kill(mb);
        gen.insert(*block, g);
        kill.insert(*block, k);
    }

    let mut live_in: HashMap<Block, HashSet<MachineRegister>> =
        blocks.iter().map(|&b| (b, HashSet::new())).collect();
    let mut live_out: HashMap<Block, HashSet<MachineRegister>> =
        blocks.iter().map(|&b| (b, HashSet::new())).collect();

    let mut changed = true;
    while changed {
        changed = false;
        for &block in blocks.iter().rev() {
            let mut out = HashSet::new();
            for &succ in &func.block(block).succs {
                out.extend(live_in[&succ].iter().copied());
            }
            let mut inn: HashSet<MachineRegister> = out.difference(&kill[&block]).copied().collect();
            inn.extend(gen[&block].iter().copied());
            if inn != live_in[&block] || out != live_out[&block] {
                changed = true;
            }
            live_in.insert(block, inn);
            live_out.insert(block, out);
        }
    }

    // Merge each block's local touch-points with the live-in/live-out extensions into a global
    // [min, max] per register.
    let mut bounds: HashMap<MachineRegister, (u32, u32)> = HashMap::new();
    for (block, mb) in &mf.blocks {
        let start = block_start[block];
        let end = block_end[block];
        let local = local_touch_points(mb, start);
        for (reg, (mut lo, mut hi)) in local {
            if live_in[block].contains(&reg) {
                lo = start;
            }
            if live_out[block].contains(&reg) {
                hi = end;
            }
            bounds
                .entry(reg)
                .and_modify(|(existing_lo, existing_hi)| {
                    *existing_lo = (*existing_lo).min(lo);
                    *existing_hi = (*existing_hi).max(hi);
                })
                .or_insert((lo, hi));
        }
        // A register live-in but never locally touched still spans the whole block.
        for &reg in &live_in[block] {
            bounds
                .entry(reg)
                .and_modify(|(lo, hi)| {
                    *lo = (*lo).min(start);
                    *hi = (*hi).max(if live_out[block].contains(&reg) { end } else { *hi });
                })
                .or_insert((start, if live_out[block].contains(&reg) { end } else { start }));
        }
    }

    let mut ranges: Vec<LiveRange> = bounds
        .into_iter()
        .map(|(reg, (start, end))| LiveRange { reg, class: mf.vreg_class(reg), start, end })
        .collect();
    ranges.sort_by_key(|r| (r.start, r.end));
    ranges
}

/// Upward-exposed uses (`gen`) and any-position definitions (`kill`) of virtual registers local
/// to one block.
fn local_gen_kill(mb: &MachineBlock) -> (HashSet<MachineRegister>, HashSet<MachineRegister>) {
    let mut gen = HashSet::new();
    let mut kill = HashSet::new();
    for inst in &mb.insts {
        for operand in &inst.operands {
            if let MachineOperand::Reg(r) = operand {
                if !r.reg.is_virtual() {
                    continue;
                }
                if r.def {
                    kill.insert(r.reg);
                } else if !kill.contains(&r.reg) {
                    gen.insert(r.reg);
                }
            }
        }
    }
    (gen, kill)
}

/// For every virtual register mentioned in `mb`, the `[min, max]` program-point positions at
/// which it's defined or used, relative to the function-wide numbering starting at `block_start`.
fn local_touch_points(mb: &MachineBlock, block_start: u32) -> HashMap<MachineRegister, (u32, u32)> {
    let mut touches: HashMap<MachineRegister, (u32, u32)> = HashMap::new();
    for (i, inst) in mb.insts.iter().enumerate() {
        let pos = block_start + i as u32;
        for operand in &inst.operands {
            if let MachineOperand::Reg(r) = operand {
                if !r.reg.is_virtual() {
                    continue;
                }
                touches
                    .entry(r.reg)
                    .and_modify(|(lo, hi)| {
                        *lo = (*lo).min(pos);
                        *hi = (*hi).max(pos);
                    })
                    .or_insert((pos, pos));
            }
        }
    }
    touches
}
