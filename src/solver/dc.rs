//! DC operating point analysis.

use std::collections::BTreeMap;

use crate::circuit::Circuit;
use crate::components::{Device, Stamp};
use crate::error::{Result, SimError};

use super::mna::MnaState;
use super::results::{current_key, DcResult};

/// Residual and Jacobian of the DC equations at the current solution.
///
/// `rhs` starts as `-Gl x` and `G` as `Gl`; the nonlinear devices then add
/// their currents and linearized conductances on top.
pub(crate) fn load_dc(devices: &[Device], state: &mut MnaState) -> Result<()> {
    let MnaState {
        system,
        matrix,
        solution,
        rhs,
        ..
    } = state;
    system.gl.mul_vec_into(solution, rhs, -1.0)?;
    system.g.copy_from(&system.gl)?;
    for device in devices.iter().rev() {
        device.load_dc(system, solution, rhs);
    }
    matrix.copy_from(&system.g)
}

impl Circuit {
    /// Find the DC operating point.
    ///
    /// Sources take their t = 0 values and capacitors are open. On success
    /// the solution stays in the circuit and seeds later AC and transient
    /// analyses.
    ///
    /// Circuits without diodes or MOSFETs are solved in a single step; a
    /// residual left after it means the equations have no solution,
    /// typically a current source driving a node with no DC path to ground.
    pub fn dc(&mut self) -> Result<DcResult> {
        let max_iters = self.config.dc_max_iters;
        let linear = !self.devices.iter().any(Device::is_nonlinear);
        let (devices, state) = self.prepare()?;
        let iterations = if linear {
            state.solve_linear(|s| load_dc(devices, s))?
        } else {
            state.find_solution(max_iters, |s| load_dc(devices, s))?
        };

        let Some(iterations) = iterations else {
            self.did_dc = false;
            let iterations = if linear { 1 } else { max_iters };
            log::warn!("DC analysis did not converge in {} iterations", iterations);
            return Err(if self.current_sources.is_empty() {
                SimError::ConvergenceFailure { iterations }
            } else {
                SimError::FloatingCurrentSource { iterations }
            });
        };
        self.did_dc = true;
        log::info!("DC analysis converged in {} iterations", iterations);

        let solution = self.solution().unwrap_or_default();
        let mut values = BTreeMap::new();
        for (name, node) in self.named_nodes() {
            values.insert(name.to_string(), node.map_or(0.0, |i| solution[i]));
        }
        for (name, branch) in self.named_source_branches() {
            values.insert(current_key(name), solution[branch]);
        }
        log::debug!("DC result: {:?}", values);
        Ok(DcResult { values, iterations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::GROUND;
    use crate::components::{Channel, DiodeKind};
    use crate::waveform::Source;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_resistor() {
        let mut ckt = Circuit::new();
        let a = ckt.voltage_node("a");
        ckt.add_voltage_source(a, GROUND, Source::constant(5.0), "V1");
        ckt.add_resistor(a, GROUND, 10.0, "R1").unwrap();
        let result = ckt.dc().unwrap();
        assert_relative_eq!(result.voltage("a").unwrap(), 5.0, epsilon = 1e-9);
        // Branch current flows from + through the source into -
        assert_relative_eq!(result.current("V1").unwrap(), -0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_divider_from_json() {
        let mut ckt = Circuit::from_json(
            r#"[
                ["v", [0, 0, 0], {"name": "V1", "value": "10"}, ["in", "gnd"]],
                ["r", [0, 0, 0], {"name": "R1", "r": "10"}, ["in", "out"]],
                ["r", [0, 0, 0], {"name": "R2", "r": "10"}, ["out", "gnd"]],
                ["g", [0, 0, 0], {}, ["gnd"]]
            ]"#,
        )
        .unwrap();
        let result = ckt.dc().unwrap();
        assert_relative_eq!(result.voltage("out").unwrap(), 5.0, epsilon = 1e-6);
        assert_eq!(result.voltage("gnd"), Some(0.0));
        assert_relative_eq!(result.current("V1").unwrap(), -0.5, epsilon = 1e-9);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_floating_current_source() {
        let mut ckt = Circuit::new();
        let a = ckt.voltage_node("a");
        let b = ckt.voltage_node("b");
        // Node a only reaches ground through a capacitor
        ckt.add_current_source(GROUND, a, Source::constant(1e-3), "I1");
        ckt.add_resistor(a, b, 1e3, "R1").unwrap();
        ckt.add_capacitor(b, GROUND, 1e-6, "C1");
        let err = ckt.dc().unwrap_err();
        assert!(matches!(err, SimError::FloatingCurrentSource { .. }));
        assert!(err.is_convergence_failure());
    }

    #[test]
    fn test_nonlinear_failure_with_current_source() {
        let mut ckt = Circuit::with_config(crate::solver::SolverConfig::new().with_dc_max_iters(1));
        let a = ckt.voltage_node("a");
        ckt.add_current_source(GROUND, a, Source::constant(1e-3), "I1");
        ckt.add_diode(a, GROUND, 1.0, DiodeKind::Normal, "D1");
        let err = ckt.dc().unwrap_err();
        // Any current source in the circuit is reported as the likely cause
        assert!(matches!(err, SimError::FloatingCurrentSource { iterations: 1 }));
    }

    #[test]
    fn test_current_source_into_resistor() {
        let mut ckt = Circuit::new();
        let a = ckt.voltage_node("a");
        // 1 mA pushed from ground into node a
        ckt.add_current_source(GROUND, a, Source::constant(1e-3), "I1");
        ckt.add_resistor(a, GROUND, 1e3, "R1").unwrap();
        let result = ckt.dc().unwrap();
        assert_relative_eq!(result.voltage("a").unwrap(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_parallel_sources_rejected() {
        let mut ckt = Circuit::new();
        let a = ckt.voltage_node("a");
        ckt.add_voltage_source(a, GROUND, Source::constant(1.0), "V1");
        ckt.add_voltage_source(a, GROUND, Source::constant(2.0), "V2");
        let err = ckt.dc().unwrap_err();
        assert!(matches!(err, SimError::VoltageSourceLoop { .. }));
    }

    #[test]
    fn test_diode_forward_bias() {
        let mut ckt = Circuit::new();
        let a = ckt.voltage_node("a");
        let k = ckt.voltage_node("k");
        ckt.add_voltage_source(a, GROUND, Source::constant(5.0), "V1");
        ckt.add_resistor(a, k, 1e3, "R1").unwrap();
        ckt.add_diode(k, GROUND, 1.0, DiodeKind::Normal, "D1");
        let result = ckt.dc().unwrap();
        let vd = result.voltage("k").unwrap();
        assert!(vd > 0.5 && vd < 0.8, "diode drop {}", vd);
        // KCL: resistor current equals diode current
        let i_r = (5.0 - vd) / 1e3;
        let i_d = 1e-14 * ((vd / crate::THERMAL_VOLTAGE).exp() - 1.0);
        assert_relative_eq!(i_r, i_d, max_relative = 1e-3);
    }

    #[test]
    fn test_nmos_saturation() {
        let mut ckt = Circuit::new();
        let vdd = ckt.voltage_node("vdd");
        let gate = ckt.voltage_node("g");
        let drain = ckt.voltage_node("d");
        ckt.add_voltage_source(vdd, GROUND, Source::constant(5.0), "VDD");
        ckt.add_voltage_source(gate, GROUND, Source::constant(1.5), "VG");
        ckt.add_resistor(vdd, drain, 10e3, "RD").unwrap();
        ckt.add_mosfet(drain, gate, GROUND, Channel::N, 2.0, "M1");
        let result = ckt.dc().unwrap();
        let vd = result.voltage("d").unwrap();
        // Saturation current with vgst = 1 and channel-length modulation
        let beta = 20e-6 * 2.0;
        let ids = 0.5 * beta * (1.0 + 0.05 * vd);
        assert_relative_eq!((5.0 - vd) / 10e3, ids, max_relative = 1e-4);
        assert!(vd > 1.0);
    }

    #[test]
    fn test_opamp_follower() {
        let mut ckt = Circuit::new();
        let input = ckt.voltage_node("in");
        let out = ckt.voltage_node("out");
        ckt.add_voltage_source(input, GROUND, Source::constant(1.0), "VIN");
        ckt.add_opamp(input, out, out, GROUND, 30000.0, "U1").unwrap();
        ckt.add_resistor(out, GROUND, 1e3, "RL").unwrap();
        let result = ckt.dc().unwrap();
        let gain = 30000.0;
        assert_relative_eq!(result.voltage("out").unwrap(), gain / (1.0 + gain), epsilon = 1e-9);
    }

    #[test]
    fn test_config_iteration_limit() {
        let mut ckt = Circuit::with_config(crate::solver::SolverConfig::new().with_dc_max_iters(1));
        let a = ckt.voltage_node("a");
        ckt.add_voltage_source(a, GROUND, Source::constant(5.0), "V1");
        ckt.add_resistor(a, GROUND, 1e3, "R1").unwrap();
        ckt.add_diode(a, GROUND, 1.0, DiodeKind::Normal, "D1");
        let err = ckt.dc().unwrap_err();
        assert!(err.is_convergence_failure());
    }
}
