//! Small-signal AC analysis.
//!
//! The circuit is linearized at its DC operating point and the complex
//! system `(G + jωC) x = b` is solved as the real 2N system
//!
//! ```text
//! | G   -ωC | | Re x |   | b |
//! | ωC   G  | | Im x | = | 0 |
//! ```

use std::collections::BTreeMap;
use std::f64::consts::{LN_10, PI};

use crate::circuit::Circuit;
use crate::components::Stamp;
use crate::error::{Result, SimError};

use super::matrix::{solve, Matrix};
use super::results::AcResult;

/// Largest single-step phase change kept as is (degrees).
const PHASE_JUMP_LIMIT: f64 = 90.0;

/// Slack on the stop frequency so rounding cannot drop the last point.
const FSTOP_SLACK: f64 = 1.0001;

/// Phase unwrapping state for one node.
#[derive(Debug, Clone, Copy, Default)]
struct PhaseTracker {
    offset: f64,
    last: Option<f64>,
}

impl PhaseTracker {
    /// Shift `phase` by whole turns so it follows on from the previous
    /// point. The first two points are taken as they come.
    fn unwrap(&mut self, phase: f64, series_len: usize) -> f64 {
        if let (Some(last), true) = (self.last, series_len > 1) {
            let jump = phase + self.offset - last;
            if jump > PHASE_JUMP_LIMIT {
                self.offset -= 360.0;
            } else if jump < -PHASE_JUMP_LIMIT {
                self.offset += 360.0;
            }
        }
        let unwrapped = phase + self.offset;
        self.last = Some(unwrapped);
        unwrapped
    }
}

impl Circuit {
    /// Sweep the small-signal response to a unit excitation at `source`.
    ///
    /// Frequencies go geometrically from `fstart` to `fstop` with `npts`
    /// points per decade. A DC operating point is computed first so
    /// nonlinear devices are linearized around it.
    pub fn ac(&mut self, npts: usize, fstart: f64, fstop: f64, source: &str) -> Result<AcResult> {
        if npts == 0 {
            return Err(SimError::invalid_param("AC points per decade must be positive"));
        }
        if !(fstart > 0.0 && fstart.is_finite()) {
            return Err(SimError::invalid_param(format!(
                "AC start frequency must be positive, got {}",
                fstart
            )));
        }
        if !(fstop >= fstart && fstop.is_finite()) {
            return Err(SimError::invalid_param(format!(
                "AC stop frequency {} is below start frequency {}",
                fstop, fstart
            )));
        }

        self.dc()?;

        let excitation = self
            .device_map
            .get(source)
            .copied()
            .ok_or_else(|| SimError::UnknownSource {
                name: source.to_string(),
            })?;

        if self.devices[excitation].source().is_none() {
            return Err(SimError::invalid_param(format!(
                "AC excitation '{}' is not a voltage or current source",
                source
            )));
        }

        let (devices, state) = self.prepare()?;
        let n = state.size();
        state.rhs.iter_mut().for_each(|r| *r = 0.0);
        devices[excitation].load_ac(&mut state.rhs);

        let g = &state.system.g;
        let c = &state.system.c;
        let mut matrix = Matrix::new(2 * n, 2 * n + 1);
        let mut x = vec![0.0; 2 * n];
        let mut mags = vec![Vec::new(); n];
        let mut phases = vec![Vec::new(); n];
        let mut trackers = vec![PhaseTracker::default(); n];
        let mut frequencies = Vec::new();

        let delta_f = (LN_10 / npts as f64).exp();
        let fstop = fstop * FSTOP_SLACK;
        let mut f = fstart;
        while f <= fstop {
            let omega = 2.0 * PI * f;
            frequencies.push(f);

            for i in 0..n {
                matrix.set(i, 2 * n, state.rhs[i]);
                matrix.set(i + n, 2 * n, 0.0);
                for j in 0..n {
                    let gij = g.get(i, j);
                    let wc = omega * c.get(i, j);
                    matrix.set(i, j, gij);
                    matrix.set(i + n, j + n, gij);
                    matrix.set(i, j + n, -wc);
                    matrix.set(i + n, j, wc);
                }
            }
            solve(&mut matrix, None, &mut x)?;

            for i in 0..n {
                let (re, im) = (x[i], x[i + n]);
                mags[i].push(re.hypot(im));
                let phase = im.atan2(re).to_degrees();
                let unwrapped = trackers[i].unwrap(phase, phases[i].len());
                phases[i].push(unwrapped);
            }
            f *= delta_f;
        }
        log::info!(
            "AC analysis: {} points from {:.3e} Hz to {:.3e} Hz driven by '{}'",
            frequencies.len(),
            fstart,
            frequencies.last().copied().unwrap_or(fstart),
            source
        );

        let points = frequencies.len();
        let mut magnitude = BTreeMap::new();
        let mut phase = BTreeMap::new();
        for (name, node) in self.named_nodes() {
            let (m, p) = match node {
                Some(i) => (mags[i].clone(), phases[i].clone()),
                None => (vec![0.0; points], vec![0.0; points]),
            };
            magnitude.insert(name.to_string(), m);
            phase.insert(name.to_string(), p);
        }
        Ok(AcResult {
            frequencies,
            magnitude,
            phase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::GROUND;
    use crate::waveform::Source;
    use approx::assert_relative_eq;

    fn rc_lowpass() -> Circuit {
        let mut ckt = Circuit::new();
        let input = ckt.voltage_node("in");
        let out = ckt.voltage_node("out");
        ckt.add_voltage_source(input, GROUND, Source::constant(0.0), "VIN");
        ckt.add_resistor(input, out, 1e3, "R1").unwrap();
        ckt.add_capacitor(out, GROUND, 1e-6, "C1");
        ckt
    }

    #[test]
    fn test_rc_corner() {
        let mut ckt = rc_lowpass();
        let corner = 1.0 / (2.0 * PI * 1e3 * 1e-6);
        let result = ckt.ac(10, 1.0, 1e5, "VIN").unwrap();
        assert_eq!(result.frequencies.len(), 51);
        assert_relative_eq!(*result.frequencies.last().unwrap(), 1e5, max_relative = 1e-9);

        let db = result.sample_db("out", &[corner]).unwrap();
        assert_relative_eq!(db[0].unwrap(), -3.0103, epsilon = 0.05);

        // Input follows the unit excitation
        let vin = result.magnitude("in").unwrap();
        assert!(vin.iter().all(|m| (m - 1.0).abs() < 1e-9));

        // Phase heads smoothly to -90 degrees
        let phase = result.phase("out").unwrap();
        assert!(phase[0].abs() < 1.0);
        assert_relative_eq!(*phase.last().unwrap(), -90.0, epsilon = 1.0);
    }

    #[test]
    fn test_unknown_source() {
        let mut ckt = rc_lowpass();
        let err = ckt.ac(10, 1.0, 1e3, "VX").unwrap_err();
        assert!(matches!(err, SimError::UnknownSource { ref name } if name == "VX"));
    }

    #[test]
    fn test_non_source_excitation() {
        let mut ckt = rc_lowpass();
        let err = ckt.ac(10, 1.0, 1e3, "R1").unwrap_err();
        assert!(matches!(err, SimError::InvalidSimulationParam { .. }));
    }

    #[test]
    fn test_invalid_sweep() {
        let mut ckt = rc_lowpass();
        assert!(ckt.ac(0, 1.0, 1e3, "VIN").is_err());
        assert!(ckt.ac(10, 0.0, 1e3, "VIN").is_err());
        assert!(ckt.ac(10, 1e3, 1.0, "VIN").is_err());
    }

    #[test]
    fn test_phase_unwrap() {
        let mut tracker = PhaseTracker::default();
        assert_eq!(tracker.unwrap(170.0, 0), 170.0);
        // The second point is never adjusted
        assert_eq!(tracker.unwrap(-170.0, 1), -170.0);
        assert_eq!(tracker.unwrap(170.0, 2), -190.0);
        assert_eq!(tracker.unwrap(-175.0, 3), -175.0);
    }
}
