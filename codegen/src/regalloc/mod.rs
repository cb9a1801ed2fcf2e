//! Linear-scan register allocation: liveness, the physical register pool, and the scan itself.

pub mod linear_scan;
pub mod live;
pub mod register_set;

use crate::ir::Function;
use crate::isa::mir::{MachineFunction, VReg};
use crate::result::CodegenResult;
use entity::EntityRef;
use register_set::RegisterSet;

/// Compute live ranges for every virtual register `mf` references and assign each a physical
/// register, recording the result into `mf.vreg_assignment`.
pub fn allocate_registers(func: &Function, mf: &mut MachineFunction) -> CodegenResult<()> {
    let pool = RegisterSet::for_target();
    let ranges = live::compute_live_ranges(func, mf);
    let assignments = linear_scan::allocate(&mf.name, &ranges, &pool)?;
    for (range, phys) in assignments {
        let vreg = VReg::new(range.reg.virtual_index() as usize);
        mf.vreg_assignment[vreg] = Some(phys);
    }
    Ok(())
}
