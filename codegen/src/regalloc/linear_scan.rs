//! Linear-scan register allocation.
//!
//! Consumes the live ranges [`super::live::compute_live_ranges`] builds and assigns each a
//! physical register from its class's pool, in start-position order. No spilling: a range that
//! finds no free register aborts the build (`CodegenError::RegisterAllocationFailed`), per the
//! explicit first-pass limitation this target documents rather than papering over.

use crate::regalloc::live::LiveRange;
use crate::regalloc::register_set::RegisterSet;
use crate::result::{CodegenError, CodegenResult};
use crate::isa::x86::registers::PhysReg;

/// One assigned range: the live range plus the physical register it was given.
struct Active {
    range: LiveRange,
    alloc: PhysReg,
}

/// Run linear-scan allocation over `ranges`, returning `(register, physical)` pairs in the same
/// order `ranges` was given (which is assumed to already be sorted by start position, as
/// `compute_live_ranges` produces).
pub fn allocate(function_name: &str, ranges: &[LiveRange], pool: &RegisterSet) -> CodegenResult<Vec<(LiveRange, PhysReg)>> {
    let mut active: Vec<Active> = Vec::new();
    let mut assigned = Vec::with_capacity(ranges.len());

    for range in ranges {
        expire_intervals(&mut active, range.start);

        let candidates = pool.class(range.class);
        let alloc = candidates
            .iter()
            .copied()
            .find(|&reg| is_available(&active, reg, range.start, range.end))
            .ok_or_else(|| CodegenError::RegisterAllocationFailed {
                function: function_name.to_string(),
                class: class_name(range.class),
                value: range.reg.virtual_index(),
                start: range.start,
                end: range.end,
            })?;

        active.push(Active { range: range.clone(), alloc });
        assigned.push((range.clone(), alloc));
    }

    Ok(assigned)
}

/// Drop every active range that ended strictly before `start`.
fn expire_intervals(active: &mut Vec<Active>, start: u32) {
    active.retain(|a| a.range.end >= start);
}

fn is_available(active: &[Active], reg: PhysReg, start: u32, end: u32) -> bool {
    !active.iter().any(|a| a.alloc == reg && a.range.start < end && a.range.end > start)
}

fn class_name(class: crate::isa::x86::registers::RegClass) -> &'static str {
    match class {
        crate::isa::x86::registers::RegClass::GeneralPurpose => "general-purpose",
        crate::isa::x86::registers::RegClass::FloatingPoint => "floating-point",
        crate::isa::x86::registers::RegClass::Vector => "vector",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::mir::MachineRegister;
    use crate::isa::x86::registers::RegClass;

    fn range(idx: u32, start: u32, end: u32) -> LiveRange {
        LiveRange { reg: MachineRegister::virtual_reg(idx), class: RegClass::GeneralPurpose, start, end }
    }

    #[test]
    fn disjoint_ranges_can_share_a_register() {
        let pool = RegisterSet::for_target();
        let ranges = vec![range(0, 0, 2), range(1, 3, 5)];
        let result = allocate("f", &ranges, &pool).unwrap();
        assert_eq!(result[0].1, result[1].1);
    }

    #[test]
    fn overlapping_ranges_get_distinct_registers() {
        let pool = RegisterSet::for_target();
        let ranges = vec![range(0, 0, 5), range(1, 2, 7)];
        let result = allocate("f", &ranges, &pool).unwrap();
        assert_ne!(result[0].1, result[1].1);
    }

    #[test]
    fn exhausting_the_pool_fails_loudly() {
        let pool = RegisterSet::for_target();
        let gp_count = pool.class(RegClass::GeneralPurpose).len() as u32;
        let ranges: Vec<LiveRange> = (0..gp_count + 1).map(|i| range(i, 0, 10)).collect();
        assert!(allocate("f", &ranges, &pool).is_err());
    }
}
