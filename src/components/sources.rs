//! Voltage and current sources.

use crate::circuit::Node;
use crate::solver::{add_to_rhs, MnaSystem};
use crate::waveform::Source;

use super::Stamp;

/// A voltage source component.
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. The source enforces: V+ - V- = V_source
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub name: String,
    pub nodes: [Node; 2], // [positive, negative]
    pub branch: usize,
    pub source: Source,
}

impl VoltageSource {
    /// Create a new voltage source.
    pub fn new(name: String, nodes: [Node; 2], branch: usize, source: Source) -> Self {
        Self {
            name,
            nodes,
            branch,
            source,
        }
    }
}

impl Stamp for VoltageSource {
    fn load_linear(&self, sys: &mut MnaSystem) {
        let [np, nn] = self.nodes;
        let br = Some(self.branch);
        sys.add_to_gl(br, np, 1.0);
        sys.add_to_gl(br, nn, -1.0);
        sys.add_to_gl(np, br, 1.0);
        sys.add_to_gl(nn, br, -1.0);
    }

    fn load_dc(&self, _sys: &mut MnaSystem, _soln: &[f64], rhs: &mut [f64]) {
        rhs[self.branch] += self.source.dc();
    }

    fn load_tran(&self, _sys: &mut MnaSystem, _soln: &[f64], rhs: &mut [f64], time: f64) {
        rhs[self.branch] += self.source.value(time);
    }

    fn load_ac(&self, rhs: &mut [f64]) {
        rhs[self.branch] += 1.0;
    }

    fn breakpoint(&self, time: f64) -> Option<f64> {
        self.source.next_discontinuity(time)
    }
}

/// A current source component.
///
/// Current flows from the positive node through the source to the
/// negative node, so it only adds to the RHS.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub name: String,
    pub nodes: [Node; 2], // [positive, negative]
    pub source: Source,
}

impl CurrentSource {
    /// Create a new current source.
    pub fn new(name: String, nodes: [Node; 2], source: Source) -> Self {
        Self {
            name,
            nodes,
            source,
        }
    }

    fn stamp_current(&self, rhs: &mut [f64], is: f64) {
        add_to_rhs(rhs, self.nodes[0], -is);
        add_to_rhs(rhs, self.nodes[1], is);
    }
}

impl Stamp for CurrentSource {
    fn load_dc(&self, _sys: &mut MnaSystem, _soln: &[f64], rhs: &mut [f64]) {
        self.stamp_current(rhs, self.source.dc());
    }

    fn load_tran(&self, _sys: &mut MnaSystem, _soln: &[f64], rhs: &mut [f64], time: f64) {
        self.stamp_current(rhs, self.source.value(time));
    }

    fn load_ac(&self, rhs: &mut [f64]) {
        self.stamp_current(rhs, 1.0);
    }

    fn breakpoint(&self, time: f64) -> Option<f64> {
        self.source.next_discontinuity(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::parse_source;

    #[test]
    fn test_voltage_source_stamps() {
        let v = VoltageSource::new("V1".into(), [Some(0), None], 1, parse_source("step(2,4,1)").unwrap());
        let mut sys = MnaSystem::new(2);
        v.load_linear(&mut sys);
        assert_eq!(sys.gl.get(1, 0), 1.0);
        assert_eq!(sys.gl.get(0, 1), 1.0);

        let mut rhs = vec![0.0; 2];
        v.load_dc(&mut sys, &[0.0, 0.0], &mut rhs);
        assert_eq!(rhs, vec![0.0, 2.0]);

        rhs.fill(0.0);
        v.load_tran(&mut sys, &[0.0, 0.0], &mut rhs, 5.0);
        assert_eq!(rhs, vec![0.0, 4.0]);

        rhs.fill(0.0);
        v.load_ac(&mut rhs);
        assert_eq!(rhs, vec![0.0, 1.0]);
        assert_eq!(v.breakpoint(0.0), Some(1.0));
    }

    #[test]
    fn test_current_source_direction() {
        let i = CurrentSource::new("I1".into(), [Some(0), Some(1)], Source::constant(1e-3));
        let mut sys = MnaSystem::new(2);
        let mut rhs = vec![0.0; 2];
        i.load_dc(&mut sys, &[0.0, 0.0], &mut rhs);
        assert_eq!(rhs, vec![-1e-3, 1e-3]);

        rhs.fill(0.0);
        i.load_ac(&mut rhs);
        assert_eq!(rhs, vec![-1.0, 1.0]);
    }
}
