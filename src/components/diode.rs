//! Diode model.
//!
//! Uses the Shockley diode equation:
//!   I = area * Is * (exp(V / Vt) - 1)
//!
//! For Newton-Raphson iteration the diode contributes its current to the
//! residual and its small-signal conductance dI/dV to `G`:
//!   G_d = area * Is / Vt * exp(V / Vt)
//!
//! Beyond |V / Vt| = 50 the exponential is continued by a quadratic so
//! the iteration cannot overflow.

use crate::circuit::Node;
use crate::solver::{add_to_rhs, two_terminal, MnaSystem};
use crate::THERMAL_VOLTAGE;

use super::Stamp;

/// Saturation current per unit area (A).
const SATURATION_CURRENT: f64 = 1e-14;

/// Thermal voltage of the near-ideal switch model (V).
const IDEAL_VT: f64 = 0.1e-3;

/// Largest exponent evaluated exactly.
const EXP_ARG_MAX: f64 = 50.0;

/// Diode flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiodeKind {
    /// Silicon junction, Vt = 25.8 mV
    #[default]
    Normal,
    /// Near-ideal switch, Vt = 0.1 mV
    Ideal,
}

impl DiodeKind {
    /// Parse the `type` property.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "ideal" => Self::Ideal,
            _ => Self::Normal,
        }
    }

    fn vt(&self) -> f64 {
        match self {
            Self::Normal => THERMAL_VOLTAGE,
            Self::Ideal => IDEAL_VT,
        }
    }
}

/// A diode component.
#[derive(Debug, Clone)]
pub struct Diode {
    pub name: String,
    pub nodes: [Node; 2], // [anode, cathode]
    pub area: f64,
    pub kind: DiodeKind,
    /// area * Is
    ais: f64,
    vt: f64,
}

impl Diode {
    /// Create a new diode. Zero-area diodes are dropped by the circuit
    /// builder.
    pub fn new(name: String, nodes: [Node; 2], area: f64, kind: DiodeKind) -> Self {
        Self {
            name,
            nodes,
            area,
            kind,
            ais: area * SATURATION_CURRENT,
            vt: kind.vt(),
        }
    }

    /// Diode current and conductance at voltage `vd`.
    pub fn evaluate(&self, vd: f64) -> (f64, f64) {
        let exp_arg = vd / self.vt;
        let abs_arg = exp_arg.abs();
        let d_arg = abs_arg - EXP_ARG_MAX;
        let (mut temp1, mut temp2) = if d_arg > 0.0 {
            let exp_max = EXP_ARG_MAX.exp();
            (
                exp_max * (1.0 + d_arg + 0.5 * d_arg * d_arg),
                exp_max * (1.0 + d_arg),
            )
        } else {
            let e = abs_arg.exp();
            (e, e)
        };
        if exp_arg < 0.0 {
            // exp(-x) = 1 / exp(x), derivative scales by 1 / exp(x)^2
            temp1 = 1.0 / temp1;
            temp2 = temp1 * temp2 * temp1;
        }
        let id = self.ais * (temp1 - 1.0);
        let gd = self.ais * (temp2 / self.vt);
        (id, gd)
    }
}

impl Stamp for Diode {
    fn load_dc(&self, sys: &mut MnaSystem, soln: &[f64], rhs: &mut [f64]) {
        let [anode, cathode] = self.nodes;
        let (id, gd) = self.evaluate(two_terminal(soln, anode, cathode));
        add_to_rhs(rhs, anode, -id);
        add_to_rhs(rhs, cathode, id);
        sys.add_conductance(anode, cathode, gd);
    }

    fn load_tran(&self, sys: &mut MnaSystem, soln: &[f64], rhs: &mut [f64], _time: f64) {
        self.load_dc(sys, soln, rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn diode() -> Diode {
        Diode::new("D1".into(), [Some(0), None], 1.0, DiodeKind::Normal)
    }

    #[test]
    fn test_zero_bias() {
        let (id, gd) = diode().evaluate(0.0);
        assert_eq!(id, 0.0);
        assert_relative_eq!(gd, 1e-14 / THERMAL_VOLTAGE);
    }

    #[test]
    fn test_forward_current() {
        let d = diode();
        let (id, gd) = d.evaluate(0.6);
        let expected = 1e-14 * ((0.6 / THERMAL_VOLTAGE).exp() - 1.0);
        assert_relative_eq!(id, expected, max_relative = 1e-12);
        assert!(gd > 0.0);
    }

    #[test]
    fn test_reverse_saturates() {
        let (id, gd) = diode().evaluate(-5.0);
        assert_relative_eq!(id, -1e-14, max_relative = 1e-6);
        assert!(gd >= 0.0 && gd < 1e-20);
    }

    #[test]
    fn test_large_bias_stays_finite() {
        let d = diode();
        let (id, gd) = d.evaluate(100.0);
        assert!(id.is_finite() && gd.is_finite());
        // Quadratic continuation is continuous at the switch point
        let edge = EXP_ARG_MAX * THERMAL_VOLTAGE;
        let (below, _) = d.evaluate(edge - 1e-9);
        let (above, _) = d.evaluate(edge + 1e-9);
        assert_relative_eq!(below, above, max_relative = 1e-6);
    }

    #[test]
    fn test_stamp() {
        let d = diode();
        let mut sys = MnaSystem::new(1);
        let mut rhs = vec![0.0];
        d.load_dc(&mut sys, &[0.3], &mut rhs);
        let (id, gd) = d.evaluate(0.3);
        assert_relative_eq!(rhs[0], -id);
        assert_relative_eq!(sys.g.get(0, 0), gd);
        assert_eq!(DiodeKind::from_name("ideal"), DiodeKind::Ideal);
    }
}
