//! Linear passive components: Resistor, Capacitor, Inductor.

use crate::circuit::Node;
use crate::solver::MnaSystem;

use super::Stamp;

/// A resistor component.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub name: String,
    pub nodes: [Node; 2],
    /// Resistance in ohms, never zero
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor. Zero resistances are turned into 0 V
    /// sources by the circuit builder before reaching here.
    pub fn new(name: String, nodes: [Node; 2], resistance: f64) -> Self {
        Self {
            name,
            nodes,
            resistance,
        }
    }

    /// Conductance in siemens.
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl Stamp for Resistor {
    fn load_linear(&self, sys: &mut MnaSystem) {
        sys.add_conductance_l(self.nodes[0], self.nodes[1], self.conductance());
    }
}

/// A capacitor component.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub name: String,
    pub nodes: [Node; 2],
    /// Capacitance in farads
    pub capacitance: f64,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(name: String, nodes: [Node; 2], capacitance: f64) -> Self {
        Self {
            name,
            nodes,
            capacitance,
        }
    }
}

impl Stamp for Capacitor {
    fn load_linear(&self, sys: &mut MnaSystem) {
        sys.add_capacitance(self.nodes[0], self.nodes[1], self.capacitance);
    }
}

/// An inductor component.
///
/// The inductor current is an MNA unknown. Its branch row states
/// `L di/dt = v(n1) - v(n2)`.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub name: String,
    pub nodes: [Node; 2],
    /// Inductance in henries
    pub inductance: f64,
    /// Branch current unknown
    pub branch: usize,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(name: String, nodes: [Node; 2], inductance: f64, branch: usize) -> Self {
        Self {
            name,
            nodes,
            inductance,
            branch,
        }
    }
}

impl Stamp for Inductor {
    fn load_linear(&self, sys: &mut MnaSystem) {
        let [n1, n2] = self.nodes;
        let br = Some(self.branch);
        sys.add_to_gl(n1, br, 1.0);
        sys.add_to_gl(n2, br, -1.0);
        sys.add_to_gl(br, n1, -1.0);
        sys.add_to_gl(br, n2, 1.0);
        sys.add_to_c(br, br, self.inductance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_symmetric(m: &crate::solver::Matrix) {
        for i in 0..m.rows() {
            for j in 0..m.cols() {
                assert_eq!(m.get(i, j), m.get(j, i), "asymmetric at ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn test_resistor_stamp() {
        let mut sys = MnaSystem::new(2);
        let r = Resistor::new("R1".into(), [Some(0), Some(1)], 1000.0);
        r.load_linear(&mut sys);
        assert_eq!(sys.gl.get(0, 0), 1e-3);
        assert_eq!(sys.gl.get(0, 1), -1e-3);
        assert_symmetric(&sys.gl);
    }

    #[test]
    fn test_passive_stamps_symmetric() {
        for &value in &[1e-12, 1.0, 4.7e3, 1e9] {
            let mut sys = MnaSystem::new(3);
            Resistor::new("R".into(), [Some(0), Some(2)], value).load_linear(&mut sys);
            Capacitor::new("C".into(), [Some(1), Some(2)], value).load_linear(&mut sys);
            Capacitor::new("C2".into(), [None, Some(0)], value).load_linear(&mut sys);
            assert_symmetric(&sys.gl);
            assert_symmetric(&sys.c);
        }
    }

    #[test]
    fn test_inductor_stamp() {
        let mut sys = MnaSystem::new(3);
        let l = Inductor::new("L1".into(), [Some(0), Some(1)], 1e-3, 2);
        l.load_linear(&mut sys);
        assert_eq!(sys.gl.get(0, 2), 1.0);
        assert_eq!(sys.gl.get(1, 2), -1.0);
        assert_eq!(sys.gl.get(2, 0), -1.0);
        assert_eq!(sys.gl.get(2, 1), 1.0);
        assert_eq!(sys.c.get(2, 2), 1e-3);
    }
}
