//! Operational amplifier model.
//!
//! A voltage-controlled voltage source with finite open-loop gain A,
//! referenced to its own ground pin. The branch row enforces
//!   (v_out - v_gnd) / A = v_in+ - v_in-
//! and the branch current flows out of the output pin.

use crate::circuit::Node;
use crate::solver::MnaSystem;

use super::Stamp;

/// An op-amp component.
#[derive(Debug, Clone)]
pub struct OpAmp {
    pub name: String,
    pub nodes: [Node; 4], // [in+, in-, out, gnd]
    /// Open-loop gain
    pub gain: f64,
    /// Output current unknown
    pub branch: usize,
}

impl OpAmp {
    /// Create a new op-amp. `gain` must be nonzero.
    pub fn new(name: String, nodes: [Node; 4], gain: f64, branch: usize) -> Self {
        Self {
            name,
            nodes,
            gain,
            branch,
        }
    }
}

impl Stamp for OpAmp {
    fn load_linear(&self, sys: &mut MnaSystem) {
        let [np, nn, no, ng] = self.nodes;
        let br = Some(self.branch);
        let inv_a = 1.0 / self.gain;
        sys.add_to_gl(no, br, 1.0);
        sys.add_to_gl(ng, br, -1.0);
        sys.add_to_gl(br, no, inv_a);
        sys.add_to_gl(br, ng, -inv_a);
        sys.add_to_gl(br, np, -1.0);
        sys.add_to_gl(br, nn, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opamp_stamp() {
        let op = OpAmp::new("U1".into(), [Some(0), Some(1), Some(2), None], 1e4, 3);
        let mut sys = MnaSystem::new(4);
        op.load_linear(&mut sys);
        assert_eq!(sys.gl.get(2, 3), 1.0);
        assert_eq!(sys.gl.get(3, 2), 1e-4);
        assert_eq!(sys.gl.get(3, 0), -1.0);
        assert_eq!(sys.gl.get(3, 1), 1.0);
        // Nothing lands on the grounded pin or in C
        assert_eq!(sys.c.max_abs(), 0.0);
    }
}
