//! Transient analysis.
//!
//! Integrates `C dx/dt + f(x, t) = 0` with the trapezoidal rule. Backward
//! Euler is used for the start-up presteps, whenever the step falls below
//! `1e-4 · tstop`, and always for algebraic unknowns. The step size follows
//! a local truncation error estimate taken from a quadratic through the
//! three previous solutions.

use std::collections::BTreeMap;

use crate::circuit::Circuit;
use crate::components::{Device, Stamp};
use crate::error::{Result, SimError};
use crate::waveform::Source;

use super::mna::MnaState;
use super::results::{current_key, TranResult};
use super::{
    LTEREL, LTE_STEP_DECREASE_FACTOR, NR_STEP_DECREASE_FACTOR, RELTOL, TIME_STEP_INCREASE_FACTOR,
};

/// Backward-Euler start-up steps taken at `tstart`.
const PRESTEPS: isize = 3;

/// Step budget per source period.
const STEPS_PER_PERIOD: usize = 50_000;

/// Ratio of the largest to the smallest timestep.
const MIN_STEP_RATIO: f64 = 1e8;

/// Ratio of the largest timestep to the first one.
const FIRST_STEP_RATIO: f64 = 1e6;

/// Below this fraction of `tstop` every unknown uses backward Euler.
const BE_FALLBACK_FRACTION: f64 = 1e-4;

/// LTE growth below this ratio keeps the step unchanged.
const STEP_GROWTH_THRESHOLD: f64 = 1.2;

/// Fraction of the LTE-suggested step taken when shrinking.
const STEP_SHRINK_MARGIN: f64 = 0.75;

/// Integration state carried from one timestep to the next.
#[derive(Debug)]
struct Integrator {
    time: f64,
    oldt: f64,
    old2t: f64,
    old3t: f64,
    /// dq/dt ≈ alpha0·q + alpha1·oldq
    alpha0: f64,
    alpha1: f64,
    /// Per-row weights of the new and previous device currents
    beta0: Vec<f64>,
    beta1: Vec<f64>,
    /// 1.0 for rows of `C` that carry no dynamics
    algebraic: Vec<f64>,
    lte_check: Vec<bool>,
    q: Vec<f64>,
    oldq: Vec<f64>,
    c: Vec<f64>,
    oldc: Vec<f64>,
    oldsol: Vec<f64>,
    old2sol: Vec<f64>,
    old3sol: Vec<f64>,
    min_step: f64,
    max_step: f64,
}

impl Integrator {
    fn new(n: usize, algebraic: Vec<f64>, lte_check: Vec<bool>, max_step: f64) -> Self {
        Self {
            time: 0.0,
            oldt: 0.0,
            old2t: 0.0,
            old3t: 0.0,
            alpha0: 1.0,
            alpha1: 0.0,
            beta0: vec![1.0; n],
            beta1: vec![0.0; n],
            algebraic,
            lte_check,
            q: vec![0.0; n],
            oldq: vec![0.0; n],
            c: vec![0.0; n],
            oldc: vec![0.0; n],
            oldsol: vec![0.0; n],
            old2sol: vec![0.0; n],
            old3sol: vec![0.0; n],
            min_step: max_step / MIN_STEP_RATIO,
            max_step,
        }
    }

    /// Residual and Jacobian of the discretized equations at `time`.
    ///
    /// `c` collects the device currents `-f(x)` and `q = C x` the charges;
    /// the residual is `beta0·c + beta1·oldc - dq/dt` and the Jacobian
    /// `beta0·G + alpha0·C`.
    fn load(&mut self, devices: &[Device], state: &mut MnaState) -> Result<()> {
        let MnaState {
            system,
            matrix,
            solution,
            rhs,
            ..
        } = state;
        system.gl.mul_vec_into(solution, &mut self.c, -1.0)?;
        system.g.copy_from(&system.gl)?;
        for device in devices.iter().rev() {
            device.load_tran(system, solution, &mut self.c, self.time);
        }
        system.c.mul_vec_into(solution, &mut self.q, 1.0)?;
        for (i, r) in rhs.iter_mut().enumerate() {
            let dqdt = self.alpha0 * self.q[i] + self.alpha1 * self.oldq[i];
            *r = self.beta0[i] * self.c[i] + self.beta1[i] * self.oldc[i] - dqdt;
        }
        matrix.scale_add_from(&system.g, &system.c, &self.beta0, self.alpha0)
    }

    /// Shift the accepted solution into the history.
    fn rotate(&mut self, solution: &[f64]) {
        self.oldc.copy_from_slice(&self.c);
        std::mem::swap(&mut self.old3sol, &mut self.old2sol);
        std::mem::swap(&mut self.old2sol, &mut self.oldsol);
        self.oldsol.copy_from_slice(solution);
        self.oldq.copy_from_slice(&self.q);
    }

    /// Set trapezoidal weights, with algebraic rows taking the full new
    /// current.
    fn set_weights(&mut self, beta0: f64, beta1: f64) {
        for ((b0, b1), ar) in self.beta0.iter_mut().zip(&mut self.beta1).zip(&self.algebraic) {
            *b0 = beta0 + ar * beta1;
            *b1 = (1.0 - ar) * beta1;
        }
    }

    fn use_backward_euler(&mut self) {
        self.beta0.iter_mut().for_each(|b| *b = 1.0);
        self.beta1.iter_mut().for_each(|b| *b = 0.0);
    }

    fn step(&self) -> f64 {
        self.time - self.oldt
    }

    /// Lagrange weights of the quadratic through the three previous time
    /// points, evaluated at `time`.
    fn interp_coeffs(&self) -> [f64; 3] {
        let (t, t0, t1, t2) = (self.time, self.oldt, self.old2t, self.old3t);
        let (dtt0, dtt1, dtt2) = (t - t0, t - t1, t - t2);
        let (dt0dt1, dt0dt2, dt1dt2) = (t0 - t1, t0 - t2, t1 - t2);
        [
            (dtt1 * dtt2) / (dt0dt1 * dt0dt2),
            (dtt0 * dtt2) / (-dt0dt1 * dt1dt2),
            (dtt0 * dtt1) / (dt0dt2 * dt1dt2),
        ]
    }

    /// Next step size from the truncation error of the solution just found.
    fn pick_step(&self, state: &MnaState) -> f64 {
        let p = self.interp_coeffs();
        let trap_coeff = 0.5 * self.step() / (self.time - self.old3t);
        let mut max_lte_ratio = 0.0_f64;
        for i in (0..state.size()).filter(|&i| self.lte_check[i]) {
            let pred = p[0] * self.oldsol[i] + p[1] * self.old2sol[i] + p[2] * self.old3sol[i];
            let lte = (state.solution[i] - pred).abs() * trap_coeff;
            let tol = LTEREL * (state.abstol[i] + RELTOL * state.soln_max[i]);
            max_lte_ratio = max_lte_ratio.max(lte / tol);
        }

        // Cube root for a second-order method
        let ratio = 1.0 / max_lte_ratio.cbrt();
        if ratio < 1.0 {
            let ratio = ratio.max(1.0 / LTE_STEP_DECREASE_FACTOR);
            (self.step() * STEP_SHRINK_MARGIN * ratio).max(self.min_step)
        } else {
            let ratio = ratio.min(TIME_STEP_INCREASE_FACTOR);
            let step = if ratio > STEP_GROWTH_THRESHOLD {
                self.step() * ratio / STEP_GROWTH_THRESHOLD
            } else {
                self.step()
            };
            step.min(self.max_step)
        }
    }
}

impl Circuit {
    /// Earliest waveform corner of any source after `time`.
    pub fn next_breakpoint(&self, time: f64) -> Option<f64> {
        self.devices
            .iter()
            .filter_map(|d| d.breakpoint(time))
            .reduce(f64::min)
    }

    /// Simulate from `tstart` to `tstop`.
    ///
    /// `min_points` sets the largest step to `(tstop - tstart) / (periods ·
    /// min_points)`, where `periods` counts the cycles of the fastest
    /// periodic source. Probed nodes always take part in step control.
    /// A DC operating point seeds the run unless `skip_dc` is set and one
    /// has already been found, in which case the solution left by the last
    /// analysis is reused. If the DC solve fails the run starts from zero.
    pub fn tran<S: AsRef<str>>(
        &mut self,
        min_points: usize,
        tstart: f64,
        tstop: f64,
        probes: &[S],
        skip_dc: bool,
    ) -> Result<TranResult> {
        if min_points == 0 {
            return Err(SimError::invalid_param("transient needs at least one point"));
        }
        if !(tstart.is_finite() && tstop.is_finite() && tstop > tstart) {
            return Err(SimError::invalid_param(format!(
                "transient interval [{}, {}] is empty",
                tstart, tstop
            )));
        }

        if !(skip_dc && self.did_dc) {
            match self.dc() {
                Ok(_) => {}
                Err(err) if err.is_convergence_failure() => {
                    log::warn!("{}; starting transient analysis from zero", err);
                    self.reset();
                }
                Err(err) => return Err(err),
            }
        }

        let span = tstop - tstart;
        let period = self
            .devices
            .iter()
            .filter_map(Device::source)
            .map(Source::period)
            .filter(|&p| p > 0.0)
            .fold(span, f64::min);
        let periods = ((span / period).ceil() as usize).max(1);
        let probed: Vec<usize> = probes
            .iter()
            .filter_map(|p| self.node_index(p.as_ref()).flatten())
            .collect();
        let max_tran_iters = self.config.max_tran_iters;

        let (devices, state) = self.prepare()?;
        let n = state.size();

        let algebraic_rows = state.system.c.algebraic_rows();
        let mut lte_check: Vec<bool> = algebraic_rows.iter().map(|ar| !ar).collect();
        for &i in &probed {
            lte_check[i] = true;
        }
        let algebraic = algebraic_rows
            .iter()
            .map(|&ar| if ar { 1.0 } else { 0.0 })
            .collect();

        log::debug!(
            "{} of {} unknowns are algebraic",
            algebraic_rows.iter().filter(|&&ar| ar).count(),
            n
        );

        let max_step = span / (periods * min_points) as f64;
        let mut integ = Integrator::new(n, algebraic, lte_check, max_step);
        let mut new_step = max_step / FIRST_STEP_RATIO;
        integ.time = tstart;
        integ.oldt = tstart - new_step;
        integ.old2t = integ.oldt - new_step;
        integ.old3t = integ.old2t - new_step;

        log::info!(
            "Transient analysis from {:.3e} s to {:.3e} s: {} period(s), max step {:.3e} s",
            tstart,
            tstop,
            periods,
            max_step
        );

        // Seed the history with the initial condition
        integ.load(devices, state)?;
        integ.oldsol.copy_from_slice(&state.solution);
        integ.old2sol.copy_from_slice(&state.solution);
        integ.old3sol.copy_from_slice(&state.solution);
        integ.oldq.copy_from_slice(&integ.q);
        integ.oldc.copy_from_slice(&integ.c);

        let mut response: Vec<Vec<f64>> = vec![Vec::new(); n];
        let mut times = Vec::new();
        let max_steps = periods * STEPS_PER_PERIOD;
        let mut finished = false;

        let mut step_index = -PRESTEPS;
        while step_index < max_steps as isize {
            if step_index >= 0 {
                for (series, &x) in response.iter_mut().zip(&state.solution) {
                    series.push(x);
                }
            }
            integ.rotate(&state.solution);

            let (beta0, beta1) = if step_index < 0 {
                integ.old3t = integ.old2t - (integ.oldt - integ.old2t);
                integ.old2t = integ.oldt - (tstart - integ.oldt);
                integ.oldt = tstart - (integ.time - integ.oldt);
                integ.time = tstart;
                (1.0, 0.0)
            } else {
                times.push(integ.time);
                integ.old3t = integ.old2t;
                integ.old2t = integ.oldt;
                integ.oldt = integ.time;
                // Come into the end of the interval smoothly
                if integ.time >= tstop {
                    finished = true;
                    break;
                } else if integ.time + new_step > tstop {
                    integ.time = tstop;
                } else if integ.time + 1.5 * new_step > tstop {
                    integ.time += (2.0 / 3.0) * (tstop - integ.time);
                } else {
                    integ.time += new_step;
                }
                (0.5, 0.5)
            };
            integ.set_weights(beta0, beta1);

            loop {
                let dt = integ.step();
                integ.alpha0 = 1.0 / dt;
                integ.alpha1 = -integ.alpha0;
                if dt < BE_FALLBACK_FRACTION * tstop {
                    integ.use_backward_euler();
                }

                let iterations = state.find_solution(max_tran_iters, |s| integ.load(devices, s))?;
                match iterations {
                    Some(_) if step_index <= 0 || dt < (1.0 + RELTOL) * integ.min_step => {
                        if step_index > 0 {
                            new_step = TIME_STEP_INCREASE_FACTOR * integ.min_step;
                        }
                        break;
                    }
                    Some(_) => {
                        new_step = integ.pick_step(state);
                        if new_step < (1.0 - RELTOL) * dt {
                            log::trace!("LTE rejects step {:.3e} s at t = {:.3e} s", dt, integ.time);
                            integ.time = integ.oldt + new_step;
                        } else {
                            break;
                        }
                    }
                    None => {
                        if dt < integ.min_step {
                            return Err(SimError::TimestepTooSmall {
                                time: integ.oldt,
                                step: dt,
                            });
                        }
                        log::debug!(
                            "Newton failed at t = {:.3e} s, shrinking step {:.3e} s",
                            integ.time,
                            dt
                        );
                        state.solution.copy_from_slice(&integ.oldsol);
                        integ.time = integ.oldt + dt / NR_STEP_DECREASE_FACTOR;
                    }
                }
            }
            step_index += 1;
        }

        if !finished {
            return Err(SimError::StepLimitExceeded {
                steps: max_steps,
                time: integ.time,
            });
        }
        log::info!("Transient analysis finished: {} time points", times.len());

        let points = times.len();
        let mut series = BTreeMap::new();
        for (name, node) in self.named_nodes() {
            let values = match node {
                Some(i) => response[i].clone(),
                None => vec![0.0; points],
            };
            series.insert(name.to_string(), values);
        }
        for (name, branch) in self.named_source_branches() {
            series.insert(current_key(name), response[branch].clone());
        }
        Ok(TranResult { times, series })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::GROUND;
    use crate::components::DiodeKind;
    use crate::waveform::parse_source;
    use approx::assert_relative_eq;

    fn rc_circuit(source: &str) -> Circuit {
        let mut ckt = Circuit::new();
        let input = ckt.voltage_node("in");
        let out = ckt.voltage_node("out");
        ckt.add_voltage_source(input, GROUND, parse_source(source).unwrap(), "VIN");
        ckt.add_resistor(input, out, 1e3, "R1").unwrap();
        ckt.add_capacitor(out, GROUND, 1e-6, "C1");
        ckt
    }

    #[test]
    fn test_rc_step_response() {
        let mut ckt = rc_circuit("step(0,1,0,1n)");
        let result = ckt.tran(100, 0.0, 5e-3, &["out"], false).unwrap();

        assert_eq!(result.times[0], 0.0);
        assert_relative_eq!(*result.times.last().unwrap(), 5e-3, max_relative = 1e-12);
        assert!(result.times.windows(2).all(|w| w[1] > w[0]));

        let out = result.get("out").unwrap();
        assert_eq!(out.len(), result.times.len());
        assert!(out[0].abs() < 1e-6);
        let v_tau = result.value_at("out", 1e-3).unwrap();
        assert_relative_eq!(v_tau, 1.0 - (-1.0_f64).exp(), epsilon = 0.01);
        let v_end = *out.last().unwrap();
        assert_relative_eq!(v_end, 1.0 - (-5.0_f64).exp(), epsilon = 0.01);

        let ground = result.get("gnd");
        assert!(ground.is_none());
        let current = result.get("I(VIN)").unwrap();
        assert_eq!(current.len(), result.times.len());
    }

    #[test]
    fn test_skip_dc_without_prior_dc_still_seeds() {
        let mut ckt = rc_circuit("1");
        let result = ckt.tran(50, 0.0, 1e-3, &["out"], true).unwrap();
        let out = result.get("out").unwrap();
        assert_relative_eq!(out[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_skip_dc_reuses_last_solution() {
        let mut ckt = rc_circuit("step(0,1,0,1n)");
        ckt.tran(100, 0.0, 5e-3, &["out"], false).unwrap();

        // The capacitor keeps the charge from the previous run
        let reused = ckt.tran(100, 0.0, 1e-3, &["out"], true).unwrap();
        let v0 = reused.get("out").unwrap()[0];
        assert_relative_eq!(v0, 1.0 - (-5.0_f64).exp(), epsilon = 0.01);

        // Without skip_dc the operating point is recomputed
        let fresh = ckt.tran(100, 0.0, 1e-3, &["out"], false).unwrap();
        assert!(fresh.get("out").unwrap()[0].abs() < 1e-6);
    }

    #[test]
    fn test_dc_seed_holds_steady_state() {
        let mut ckt = rc_circuit("1");
        let result = ckt.tran(50, 0.0, 1e-3, &["out"], false).unwrap();
        let out = result.get("out").unwrap();
        assert!(out.iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_sine_period_limits_step() {
        let mut ckt = rc_circuit("sin(0,1,1k)");
        let result = ckt.tran(20, 0.0, 5e-3, &["in"], false).unwrap();
        // Five periods with at least twenty points each, max step 50 us
        assert!(result.times.len() >= 100);
        let max_gap = result
            .times
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(0.0, f64::max);
        assert!(max_gap <= 5e-5 * (1.0 + 1e-9));
        let v = result.value_at("in", 0.25e-3).unwrap();
        assert_relative_eq!(v, 1.0, epsilon = 0.02);
    }

    #[test]
    fn test_inductor_current_ramp() {
        let mut ckt = Circuit::new();
        let a = ckt.voltage_node("a");
        ckt.add_voltage_source(a, GROUND, parse_source("step(0,1,0,1n)").unwrap(), "V1");
        ckt.add_inductor(a, GROUND, 1e-3, "L1");
        ckt.add_resistor(a, GROUND, 1e3, "R1").unwrap();
        let result = ckt.tran(100, 0.0, 1e-3, &["a"], false).unwrap();
        // V1 supplies the resistor plus an inductor current of t / L
        let i = result.value_at("I(V1)", 0.5e-3).unwrap();
        assert_relative_eq!(i, -(1e-3 + 0.5), max_relative = 0.01);
    }

    #[test]
    fn test_newton_failure_shrinks_to_min_step() {
        let config = crate::solver::SolverConfig::new().with_max_tran_iters(1);
        let mut ckt = Circuit::with_config(config);
        let a = ckt.voltage_node("a");
        // One Newton iteration cannot follow the diode through the current step
        ckt.add_current_source(GROUND, a, parse_source("step(0,1m,0.5m,1n)").unwrap(), "I1");
        ckt.add_diode(a, GROUND, 1.0, DiodeKind::Normal, "D1");
        let err = ckt.tran(100, 0.0, 1e-3, &[] as &[&str], false).unwrap_err();
        match err {
            SimError::TimestepTooSmall { time, step } => {
                assert!((0.49e-3..=0.5e-3).contains(&time), "failed at {}", time);
                assert!(step < 1e-5 / MIN_STEP_RATIO);
            }
            other => panic!("expected TimestepTooSmall, got {:?}", other),
        }
    }

    #[test]
    fn test_step_ceiling() {
        let mut ckt = rc_circuit("sin(0,1,1k)");
        // One period needs 100000 steps at the largest step, twice the budget
        let err = ckt.tran(100_000, 0.0, 1e-3, &["out"], false).unwrap_err();
        match err {
            SimError::StepLimitExceeded { steps, time } => {
                assert_eq!(steps, STEPS_PER_PERIOD);
                assert!(time < 1e-3);
            }
            other => panic!("expected StepLimitExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_interval() {
        let mut ckt = rc_circuit("1");
        assert!(ckt.tran(100, 1.0, 1.0, &["out"], false).is_err());
        assert!(ckt.tran(0, 0.0, 1.0, &["out"], false).is_err());
    }

    #[test]
    fn test_next_breakpoint() {
        let ckt = rc_circuit("pulse(0,1,1m,1u,1u,1m,4m)");
        assert_eq!(ckt.next_breakpoint(0.0), Some(1e-3));
        assert!(rc_circuit("1").next_breakpoint(0.0).is_none());
    }
}
