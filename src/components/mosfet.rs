//! Simplified MOSFET model.
//!
//! Square-law model with channel-length modulation and no body effect:
//!
//! | Region | Condition | Ids |
//! |--------|-----------|-----|
//! | Cutoff | Vgs - Vt <= 0 | 0 |
//! | Triode | Vds <= Vgs - Vt | β(1 + λVds)·Vds·(Vgst - Vds/2) |
//! | Saturation | Vds > Vgs - Vt | β/2·(1 + λVds)·Vgst² |
//!
//! β = Kp·W/L. The device is symmetric, so whichever of drain and source
//! sits at the higher potential (lower for PMOS) acts as the drain.

use crate::circuit::Node;
use crate::solver::{add_to_rhs, two_terminal, MnaSystem};

use super::Stamp;

/// Threshold voltage (V).
const VT: f64 = 0.5;

/// Process transconductance (A/V²).
const KP: f64 = 20e-6;

/// Channel-length modulation (1/V).
const LAMBDA: f64 = 0.05;

/// MOSFET polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    N,
    P,
}

impl Channel {
    fn sign(&self) -> f64 {
        match self {
            Channel::N => 1.0,
            Channel::P => -1.0,
        }
    }
}

/// A MOSFET component.
#[derive(Debug, Clone)]
pub struct Mosfet {
    pub name: String,
    pub nodes: [Node; 3], // [drain, gate, source]
    pub channel: Channel,
    /// Width over length
    pub ratio: f64,
    beta: f64,
}

/// Linearized drain current at one operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OperatingPoint {
    ids: f64,
    gds: f64,
    gm: f64,
}

impl Mosfet {
    /// Create a new MOSFET.
    pub fn new(name: String, nodes: [Node; 3], channel: Channel, ratio: f64) -> Self {
        Self {
            name,
            nodes,
            channel,
            ratio,
            beta: KP * ratio,
        }
    }

    /// Drain and source in the roles they play at `soln`, with the
    /// polarity-corrected `vds` between them.
    fn oriented(&self, soln: &[f64]) -> (Node, Node, f64) {
        let sign = self.channel.sign();
        let [d, _, s] = self.nodes;
        let vds = sign * two_terminal(soln, d, s);
        if vds < 0.0 {
            (s, d, -vds)
        } else {
            (d, s, vds)
        }
    }

    /// Current and small-signal conductances, `None` below threshold.
    fn operating_point(&self, vgs: f64, vds: f64) -> Option<OperatingPoint> {
        let vgst = vgs - VT;
        if vgst <= 0.0 {
            return None;
        }
        let sign = self.channel.sign();
        let beta = self.beta;
        let op = if vgst < vds {
            let gm = beta * (1.0 + LAMBDA * vds) * vgst;
            OperatingPoint {
                ids: sign * 0.5 * gm * vgst,
                gds: 0.5 * beta * vgst * vgst * LAMBDA,
                gm,
            }
        } else {
            let gm = beta * (1.0 + LAMBDA * vds);
            OperatingPoint {
                ids: sign * gm * vds * (vgst - 0.5 * vds),
                gds: gm * (vgst - vds) + beta * LAMBDA * vds * (vgst - 0.5 * vds),
                gm: gm * vds,
            }
        };
        Some(op)
    }

    /// Oriented drain and source with the linearized current between them,
    /// `None` in cutoff.
    fn bias(&self, soln: &[f64]) -> Option<(Node, Node, OperatingPoint)> {
        let (d, s, vds) = self.oriented(soln);
        let vgs = self.channel.sign() * two_terminal(soln, self.nodes[1], s);
        self.operating_point(vgs, vds).map(|op| (d, s, op))
    }

    /// Drain current flowing into the drain terminal at `soln`.
    #[cfg(test)]
    fn drain_current(&self, soln: &[f64]) -> f64 {
        match self.bias(soln) {
            Some((d, _, op)) if d == self.nodes[0] => op.ids,
            Some((_, _, op)) => -op.ids,
            None => 0.0,
        }
    }
}

impl Stamp for Mosfet {
    fn load_dc(&self, sys: &mut MnaSystem, soln: &[f64], rhs: &mut [f64]) {
        let Some((d, s, op)) = self.bias(soln) else {
            return;
        };
        let g = self.nodes[1];
        add_to_rhs(rhs, d, -op.ids);
        add_to_rhs(rhs, s, op.ids);
        sys.add_conductance(d, s, op.gds);
        sys.add_to_g(s, s, op.gm);
        sys.add_to_g(d, s, -op.gm);
        sys.add_to_g(d, g, op.gm);
        sys.add_to_g(s, g, -op.gm);
    }

    fn load_tran(&self, sys: &mut MnaSystem, soln: &[f64], rhs: &mut [f64], _time: f64) {
        self.load_dc(sys, soln, rhs);
    }
}
