//! MNA matrix assembly.

use crate::circuit::{Node, UnknownKind};

use super::matrix::Matrix;
use super::{I_ABSTOL, V_ABSTOL};

/// The stamped system matrices.
///
/// Devices write into these through the stamp helpers; terms that touch
/// ground are dropped.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    /// Number of unknowns
    pub size: usize,
    /// Linear conductances and branch couplings
    pub gl: Matrix,
    /// Working conductances (`Gl` plus linearized nonlinear devices)
    pub g: Matrix,
    /// Capacitances and inductances
    pub c: Matrix,
}

impl MnaSystem {
    /// Allocate zero matrices for `size` unknowns.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            gl: Matrix::new(size, size),
            g: Matrix::new(size, size),
            c: Matrix::new(size, size),
        }
    }

    /// Stamp a conductance between two nodes.
    /// For a conductance g between nodes i and j:
    ///   M[i,i] += g
    ///   M[j,j] += g
    ///   M[i,j] -= g
    ///   M[j,i] -= g
    fn stamp_two_terminal(m: &mut Matrix, i: Node, j: Node, g: f64) {
        if let Some(i) = i {
            m.add(i, i, g);
        }
        if let Some(j) = j {
            m.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (i, j) {
            m.add(i, j, -g);
            m.add(j, i, -g);
        }
    }

    /// Add a linear conductance to `Gl`.
    pub fn add_conductance_l(&mut self, i: Node, j: Node, g: f64) {
        Self::stamp_two_terminal(&mut self.gl, i, j, g);
    }

    /// Add a linearized conductance to `G`.
    pub fn add_conductance(&mut self, i: Node, j: Node, g: f64) {
        Self::stamp_two_terminal(&mut self.g, i, j, g);
    }

    /// Add a capacitance to `C`.
    pub fn add_capacitance(&mut self, i: Node, j: Node, c: f64) {
        Self::stamp_two_terminal(&mut self.c, i, j, c);
    }

    /// Add a single entry to `Gl`.
    pub fn add_to_gl(&mut self, i: Node, j: Node, v: f64) {
        if let (Some(i), Some(j)) = (i, j) {
            self.gl.add(i, j, v);
        }
    }

    /// Add a single entry to `G`.
    pub fn add_to_g(&mut self, i: Node, j: Node, v: f64) {
        if let (Some(i), Some(j)) = (i, j) {
            self.g.add(i, j, v);
        }
    }

    /// Add a single entry to `C`.
    pub fn add_to_c(&mut self, i: Node, j: Node, v: f64) {
        if let (Some(i), Some(j)) = (i, j) {
            self.c.add(i, j, v);
        }
    }
}

/// Add `v` to a residual entry unless the node is ground.
pub fn add_to_rhs(rhs: &mut [f64], i: Node, v: f64) {
    if let Some(i) = i {
        rhs[i] += v;
    }
}

/// Voltage across two nodes, ground reading 0.
pub fn two_terminal(x: &[f64], i: Node, j: Node) -> f64 {
    let vi = i.map_or(0.0, |i| x[i]);
    let vj = j.map_or(0.0, |j| x[j]);
    vi - vj
}

/// Everything an analysis works on once the circuit is finalized.
#[derive(Debug, Clone)]
pub struct MnaState {
    /// Stamped system matrices
    pub system: MnaSystem,
    /// Augmented N×(N+1) Jacobian handed to the linear solver
    pub matrix: Matrix,
    /// Current solution
    pub solution: Vec<f64>,
    /// Residual `-f(x)`
    pub rhs: Vec<f64>,
    /// Largest magnitude each unknown has reached in a converged solution
    pub soln_max: Vec<f64>,
    /// Per-unknown absolute tolerance
    pub abstol: Vec<f64>,
    /// Kind of each unknown
    pub kinds: Vec<UnknownKind>,
    /// Newton update, kept across iterations so a bad step can be undone
    pub(crate) delta: Vec<f64>,
}

impl MnaState {
    /// Allocate state for the given unknowns.
    pub fn new(kinds: &[UnknownKind]) -> Self {
        let n = kinds.len();
        let abstol = kinds
            .iter()
            .map(|k| match k {
                UnknownKind::Voltage => V_ABSTOL,
                UnknownKind::Current => I_ABSTOL,
            })
            .collect();
        Self {
            system: MnaSystem::new(n),
            matrix: Matrix::new(n, n + 1),
            solution: vec![0.0; n],
            rhs: vec![0.0; n],
            soln_max: vec![0.0; n],
            abstol,
            kinds: kinds.to_vec(),
            delta: vec![0.0; n],
        }
    }

    /// Number of unknowns.
    pub fn size(&self) -> usize {
        self.system.size
    }
}
