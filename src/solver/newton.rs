//! Newton-Raphson iteration for nonlinear circuits.

use crate::circuit::UnknownKind;
use crate::error::Result;

use super::matrix::solve_rq;
use super::mna::MnaState;
use super::{RELTOL, RES_CHECK_ABS, RES_CHECK_REL, V_NEWT_LIM};

/// Consecutive improving iterations after which step limiting switches off.
const LIMITING_RELEASE_COUNT: usize = 10;

impl MnaState {
    /// L1 norm of the residual over the voltage unknowns.
    fn voltage_residual(&self) -> f64 {
        self.rhs
            .iter()
            .zip(&self.kinds)
            .filter(|(_, k)| **k == UnknownKind::Voltage)
            .map(|(r, _)| r.abs())
            .sum()
    }

    /// Iterate to a solution of `f(x) = 0`.
    ///
    /// `load` must overwrite `rhs` with `-f(x)` and `matrix` with the
    /// Jacobian at the current `solution`. When an iteration makes the
    /// residual worse, the previous update is backed out and voltage steps
    /// are clamped to ±`V_NEWT_LIM` until the residual has improved for
    /// several iterations in a row.
    ///
    /// Returns the number of iterations used, or `None` when `max_iters`
    /// was exhausted. Errors from `load` or the linear solver propagate.
    pub fn find_solution<F>(&mut self, max_iters: usize, mut load: F) -> Result<Option<usize>>
    where
        F: FnMut(&mut MnaState) -> Result<()>,
    {
        let n = self.size();
        let last_iter = max_iters.saturating_sub(1);
        let mut use_limiting = false;
        let mut down_count = 0;
        let mut abssum_old = 0.0;
        let mut abssum_compare = 0.0;

        let mut iter = 0;
        while iter < max_iters {
            load(self)?;
            let abssum_rhs = self.voltage_residual();

            if iter > 0 && !use_limiting && abssum_old < abssum_rhs {
                // Residual grew: back out the last update and retry it limited
                for (x, dx) in self.solution.iter_mut().zip(&self.delta) {
                    *x -= dx;
                }
                iter -= 1;
                use_limiting = true;
            } else {
                solve_rq(&mut self.matrix, Some(&self.rhs), &mut self.delta)?;
                if abssum_rhs < abssum_old {
                    down_count += 1;
                } else {
                    down_count = 0;
                }
                if down_count > LIMITING_RELEASE_COUNT {
                    use_limiting = false;
                    down_count = 0;
                }
                abssum_old = abssum_rhs;
            }

            if iter == 0 || abssum_rhs > abssum_compare {
                abssum_compare = abssum_rhs;
            }

            let mut converged =
                !(iter < last_iter && abssum_rhs > RES_CHECK_ABS + RES_CHECK_REL * abssum_compare);

            for i in 0..n {
                if use_limiting && self.kinds[i] == UnknownKind::Voltage {
                    self.delta[i] = self.delta[i].clamp(-V_NEWT_LIM, V_NEWT_LIM);
                }
                self.solution[i] += self.delta[i];
                if self.delta[i].abs() > self.abstol[i] + RELTOL * self.soln_max[i] {
                    converged = false;
                }
            }

            log::trace!(
                "Newton iteration {}: residual {:.3e}, limiting {}",
                iter,
                abssum_rhs,
                use_limiting
            );

            if converged {
                for (max, x) in self.soln_max.iter_mut().zip(&self.solution) {
                    *max = max.max(x.abs());
                }
                return Ok(Some(iter + 1));
            }
            iter += 1;
        }

        Ok(None)
    }

    /// Single Newton step for equations whose Jacobian does not depend on
    /// the solution.
    ///
    /// Returns `Some(1)` when the step removes the residual and `None` when
    /// it cannot, which means the linear system is inconsistent.
    pub fn solve_linear<F>(&mut self, mut load: F) -> Result<Option<usize>>
    where
        F: FnMut(&mut MnaState) -> Result<()>,
    {
        load(self)?;
        let initial = self.voltage_residual();
        solve_rq(&mut self.matrix, Some(&self.rhs), &mut self.delta)?;
        for (x, dx) in self.solution.iter_mut().zip(&self.delta) {
            *x += dx;
        }

        load(self)?;
        let residual = self.voltage_residual();
        log::trace!("Linear solve: residual {:.3e} -> {:.3e}", initial, residual);
        if residual > RES_CHECK_ABS + RES_CHECK_REL * initial {
            return Ok(None);
        }
        for (max, x) in self.soln_max.iter_mut().zip(&self.solution) {
            *max = max.max(x.abs());
        }
        Ok(Some(1))
    }
}
