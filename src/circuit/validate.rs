//! Circuit validation.

use crate::error::{Result, SimError};
use crate::solver::{Matrix, MnaSystem};

/// Check that the voltage sources are independent.
///
/// Each source's branch row of `Gl` is one constraint on the node
/// voltages. Parallel sources, loops of sources, or a source shorted by a
/// wire make those rows linearly dependent, which the rank exposes.
pub fn check_voltage_source_loops(system: &MnaSystem, branches: &[usize]) -> Result<()> {
    if branches.is_empty() {
        return Ok(());
    }
    let n = system.size;
    let mut constraints = Matrix::new(branches.len(), n);
    for (row, &branch) in branches.iter().enumerate() {
        constraints.row_mut(row).copy_from_slice(system.gl.row(branch));
    }

    let independent = constraints.rank();
    if independent < branches.len() {
        return Err(SimError::VoltageSourceLoop {
            sources: branches.len(),
            independent,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stamp a voltage source's branch coupling between `np` and ground.
    fn stamp_source(sys: &mut MnaSystem, np: usize, br: usize) {
        sys.add_to_gl(Some(br), Some(np), 1.0);
        sys.add_to_gl(Some(np), Some(br), 1.0);
    }

    #[test]
    fn test_independent_sources_pass() {
        let mut sys = MnaSystem::new(4);
        stamp_source(&mut sys, 0, 2);
        stamp_source(&mut sys, 1, 3);
        assert!(check_voltage_source_loops(&sys, &[2, 3]).is_ok());
    }

    #[test]
    fn test_parallel_sources_fail() {
        let mut sys = MnaSystem::new(3);
        stamp_source(&mut sys, 0, 1);
        stamp_source(&mut sys, 0, 2);
        let err = check_voltage_source_loops(&sys, &[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            SimError::VoltageSourceLoop {
                sources: 2,
                independent: 1
            }
        ));
    }
}
