//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! The unknowns are node voltages plus one branch current per inductor,
//! voltage source, op-amp and ammeter. Three N×N matrices are kept:
//!
//! - `Gl`: linear conductances and branch couplings, stamped once
//! - `G`: `Gl` plus the linearized nonlinear devices, rebuilt every iteration
//! - `C`: capacitances and inductances
//!
//! Each Newton iteration assembles the residual `rhs = -f(x)` and the
//! Jacobian into an N×(N+1) augmented matrix and solves for the update.
//!
//! ## Analyses
//!
//! | Analysis | Method |
//! |----------|--------|
//! | DC | Newton-Raphson on `G x = rhs` |
//! | AC | Complex system `(G + jωC) x = b` split into a 2N real system |
//! | Transient | Trapezoidal rule with backward-Euler start-up, LTE step control |

mod ac;
mod config;
mod dc;
mod matrix;
mod mna;
mod newton;
mod results;
mod transient;

pub use config::SolverConfig;
pub use matrix::{solve, solve_rq, Matrix};
pub use mna::{add_to_rhs, two_terminal, MnaState, MnaSystem};
pub use results::{interpolate, AcResult, DcResult, TranResult};

/// Largest Newton voltage step while limiting is active (V).
pub const V_NEWT_LIM: f64 = 0.3;

/// Absolute convergence tolerance for voltage unknowns (V).
pub const V_ABSTOL: f64 = 1e-6;

/// Absolute convergence tolerance for current unknowns (A).
pub const I_ABSTOL: f64 = 1e-12;

/// Relative convergence tolerance.
pub const RELTOL: f64 = 1e-4;

/// Relative threshold below which a pivot or row counts as zero.
pub const EPS: f64 = 1e-12;

/// Default Newton iteration limit for the DC operating point.
pub const DC_MAX_ITERS: usize = 1000;

/// Default Newton iteration limit per transient step.
pub const MAX_TRAN_ITERS: usize = 20;

/// Largest growth of the timestep from one step to the next.
pub const TIME_STEP_INCREASE_FACTOR: f64 = 2.0;

/// Largest LTE-driven reduction of the timestep.
pub const LTE_STEP_DECREASE_FACTOR: f64 = 8.0;

/// Timestep reduction after a Newton failure.
pub const NR_STEP_DECREASE_FACTOR: f64 = 4.0;

/// LTE tolerance relative to the Newton tolerance.
pub const LTEREL: f64 = 10.0;

/// Absolute residual threshold, `sqrt(I_ABSTOL)`.
pub const RES_CHECK_ABS: f64 = 1e-6;

/// Relative residual threshold, `sqrt(RELTOL)`.
pub const RES_CHECK_REL: f64 = 1e-2;
