//! Device models for circuit simulation.
//!
//! This module provides models for all supported circuit devices:
//! - Linear: Resistor, Capacitor, Inductor, Op-Amp
//! - Sources: Voltage Source (also used for ammeters), Current Source
//! - Nonlinear: Diode, MOSFET
//!
//! Each device implements [`Stamp`]: a one-time linear stamp into `Gl` and
//! `C`, plus per-iteration contributions for DC, transient and AC analysis.
//! Residual contributions follow the `rhs = -f(x)` convention.

mod diode;
mod linear;
mod mosfet;
mod opamp;
mod sources;

pub use diode::{Diode, DiodeKind};
pub use linear::{Capacitor, Inductor, Resistor};
pub use mosfet::{Channel, Mosfet};
pub use opamp::OpAmp;
pub use sources::{CurrentSource, VoltageSource};

use crate::solver::MnaSystem;
use crate::waveform::Source;

/// Contributions a device makes to the MNA system.
///
/// Every method has a no-op default so devices implement only what they
/// stamp.
pub trait Stamp {
    /// Stamp constant terms into `Gl` and `C`. Called once per finalize.
    fn load_linear(&self, _sys: &mut MnaSystem) {}

    /// Add DC residual terms to `rhs` and linearized conductances to `G`
    /// at the operating point `soln`.
    fn load_dc(&self, _sys: &mut MnaSystem, _soln: &[f64], _rhs: &mut [f64]) {}

    /// Like [`Stamp::load_dc`] with sources evaluated at `time`.
    fn load_tran(&self, _sys: &mut MnaSystem, _soln: &[f64], _rhs: &mut [f64], _time: f64) {}

    /// Stamp the unit small-signal excitation when this device drives AC
    /// analysis.
    fn load_ac(&self, _rhs: &mut [f64]) {}

    /// Next time after `time` where the device's waveform has a corner.
    fn breakpoint(&self, _time: f64) -> Option<f64> {
        None
    }
}

/// A circuit device.
#[derive(Debug, Clone)]
pub enum Device {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Diode(Diode),
    OpAmp(OpAmp),
    Mosfet(Mosfet),
}

impl Device {
    /// Get the device name.
    pub fn name(&self) -> &str {
        match self {
            Device::Resistor(r) => &r.name,
            Device::Capacitor(c) => &c.name,
            Device::Inductor(l) => &l.name,
            Device::VoltageSource(v) => &v.name,
            Device::CurrentSource(i) => &i.name,
            Device::Diode(d) => &d.name,
            Device::OpAmp(o) => &o.name,
            Device::Mosfet(m) => &m.name,
        }
    }

    /// Check if this device is nonlinear (requires Newton-Raphson iteration).
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, Device::Diode(_) | Device::Mosfet(_))
    }

    /// The independent waveform driving this device, if any.
    pub fn source(&self) -> Option<&Source> {
        match self {
            Device::VoltageSource(v) => Some(&v.source),
            Device::CurrentSource(i) => Some(&i.source),
            _ => None,
        }
    }

    fn as_stamp(&self) -> &dyn Stamp {
        match self {
            Device::Resistor(r) => r,
            Device::Capacitor(c) => c,
            Device::Inductor(l) => l,
            Device::VoltageSource(v) => v,
            Device::CurrentSource(i) => i,
            Device::Diode(d) => d,
            Device::OpAmp(o) => o,
            Device::Mosfet(m) => m,
        }
    }
}

impl Stamp for Device {
    fn load_linear(&self, sys: &mut MnaSystem) {
        self.as_stamp().load_linear(sys);
    }

    fn load_dc(&self, sys: &mut MnaSystem, soln: &[f64], rhs: &mut [f64]) {
        self.as_stamp().load_dc(sys, soln, rhs);
    }

    fn load_tran(&self, sys: &mut MnaSystem, soln: &[f64], rhs: &mut [f64], time: f64) {
        self.as_stamp().load_tran(sys, soln, rhs, time);
    }

    fn load_ac(&self, rhs: &mut [f64]) {
        self.as_stamp().load_ac(rhs);
    }

    fn breakpoint(&self, time: f64) -> Option<f64> {
        self.as_stamp().breakpoint(time)
    }
}
