//! Dense matrix utilities for the MNA solver.
//!
//! Matrices are stored row-major in a flat `Vec<f64>`. Systems are solved
//! in augmented form `[A | b]`, so a matrix for an N-unknown system has
//! N rows and N+1 columns.

use crate::error::{Result, SimError};
use crate::solver::EPS;

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Allocate a zero matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build a matrix from rows of equal length.
    pub fn from_rows(rows: &[&[f64]]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut m = Self::new(rows.len(), cols);
        for (i, row) in rows.iter().enumerate() {
            m.row_mut(i)[..row.len().min(cols)].copy_from_slice(&row[..row.len().min(cols)]);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Get element at (row, col).
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Set element at (row, col).
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Add to element at (row, col).
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] += value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Set every element to zero.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Largest absolute entry.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |m, v| m.max(v.abs()))
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let cols = self.cols;
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.data.split_at_mut(hi * cols);
        head[lo * cols..(lo + 1) * cols].swap_with_slice(&mut tail[..cols]);
    }

    /// Form `b = scale * M x`.
    pub fn mul_vec_into(&self, x: &[f64], b: &mut [f64], scale: f64) -> Result<()> {
        if b.len() != self.rows {
            return Err(SimError::DimensionMismatch {
                operation: "matrix-vector product (rows)",
                expected: self.rows,
                actual: b.len(),
            });
        }
        if x.len() != self.cols {
            return Err(SimError::DimensionMismatch {
                operation: "matrix-vector product (columns)",
                expected: self.cols,
                actual: x.len(),
            });
        }
        for (i, out) in b.iter_mut().enumerate() {
            let dot: f64 = self.row(i).iter().zip(x).map(|(m, v)| m * v).sum();
            *out = scale * dot;
        }
        Ok(())
    }

    /// Copy `src` into the top-left corner of `self`.
    pub fn copy_from(&mut self, src: &Matrix) -> Result<()> {
        self.check_fits("matrix copy", src)?;
        for i in 0..src.rows {
            self.row_mut(i)[..src.cols].copy_from_slice(src.row(i));
        }
        Ok(())
    }

    /// Write `scale_a[i] * A + scale_b * B` into the top-left of `self`,
    /// scaling row `i` of `A` by `scale_a[i]`.
    pub fn scale_add_from(&mut self, a: &Matrix, b: &Matrix, scale_a: &[f64], scale_b: f64) -> Result<()> {
        b.check_fits("scaled sum (second operand)", a)?;
        self.check_fits("scaled sum (destination)", a)?;
        if scale_a.len() < a.rows {
            return Err(SimError::DimensionMismatch {
                operation: "scaled sum (row scales)",
                expected: a.rows,
                actual: scale_a.len(),
            });
        }
        for i in 0..a.rows {
            let sa = scale_a[i];
            for j in 0..a.cols {
                let v = sa * a.get(i, j) + scale_b * b.get(i, j);
                self.set(i, j, v);
            }
        }
        Ok(())
    }

    fn check_fits(&self, operation: &'static str, src: &Matrix) -> Result<()> {
        if src.rows > self.rows {
            return Err(SimError::DimensionMismatch {
                operation,
                expected: self.rows,
                actual: src.rows,
            });
        }
        if src.cols > self.cols {
            return Err(SimError::DimensionMismatch {
                operation,
                expected: self.cols,
                actual: src.cols,
            });
        }
        Ok(())
    }

    /// Numerical rank by Gaussian elimination with row pivoting.
    ///
    /// A pivot counts when it exceeds `EPS` times the largest entry.
    pub fn rank(&self) -> usize {
        if self.rows == 0 || self.cols == 0 {
            return 0;
        }
        let mut m = self.clone();
        let threshold = EPS * m.max_abs();

        let mut rank = 0;
        let mut start_col = 0;
        for row in 0..m.rows {
            for col in start_col..m.cols {
                let mut max_v = m.get(row, col).abs();
                let mut max_row = row;
                for i in row + 1..m.rows {
                    let v = m.get(i, col).abs();
                    if v > max_v {
                        max_v = v;
                        max_row = i;
                    }
                }
                if max_v > threshold {
                    start_col = col + 1;
                    rank += 1;
                    m.swap_rows(row, max_row);
                    let pivot = m.get(row, col);
                    for i in row + 1..m.rows {
                        let factor = m.get(i, col) / pivot;
                        if factor != 0.0 {
                            for j in col..m.cols {
                                let v = m.get(row, j);
                                m.add(i, j, -v * factor);
                            }
                        }
                    }
                    break;
                }
            }
        }
        rank
    }

    /// Mark rows that can be zeroed without changing the rank.
    ///
    /// Applied to the capacitance matrix, these rows are the unknowns with
    /// no storage element: they obey algebraic rather than differential
    /// equations.
    pub fn algebraic_rows(&self) -> Vec<bool> {
        let n = self.rows;
        let mut work = self.clone();
        let rank = work.rank();
        let mut algebraic = vec![false; n];
        for (row, flag) in algebraic.iter_mut().enumerate() {
            work.row_mut(row).fill(0.0);
            if work.rank() == rank {
                *flag = true;
            } else {
                work.row_mut(row).copy_from_slice(self.row(row));
            }
        }
        algebraic
    }
}

fn check_augmented(m: &Matrix, x: &[f64], rhs: Option<&[f64]>) -> Result<()> {
    if m.cols != m.rows + 1 || x.len() != m.rows {
        return Err(SimError::DimensionMismatch {
            operation: "augmented solve",
            expected: m.rows + 1,
            actual: m.cols,
        });
    }
    if let Some(rhs) = rhs {
        if rhs.len() != m.rows {
            return Err(SimError::DimensionMismatch {
                operation: "augmented solve (right-hand side)",
                expected: m.rows,
                actual: rhs.len(),
            });
        }
    }
    Ok(())
}

/// Solve the augmented system `[A | b]` by Gaussian elimination with
/// partial pivoting, writing the result into `x`.
///
/// When `rhs` is given it replaces the last column first. A column with no
/// usable pivot gets `EPS` on the diagonal, which acts like a tiny
/// conductance to ground.
pub fn solve(m: &mut Matrix, rhs: Option<&[f64]>, x: &mut [f64]) -> Result<()> {
    check_augmented(m, x, rhs)?;
    let n = m.rows;
    if let Some(rhs) = rhs {
        for (row, &v) in rhs.iter().enumerate() {
            m.set(row, n, v);
        }
    }

    for col in 0..n {
        let mut max_v = m.get(col, col).abs();
        let mut max_row = col;
        for i in col + 1..n {
            let v = m.get(i, col).abs();
            if v > max_v {
                max_v = v;
                max_row = i;
            }
        }

        if max_v == 0.0 {
            m.set(col, col, EPS);
        } else {
            m.swap_rows(col, max_row);
        }

        let pivot = m.get(col, col);
        for i in col + 1..n {
            let factor = m.get(i, col) / pivot;
            if factor != 0.0 {
                for j in col..=n {
                    let v = m.get(col, j);
                    m.add(i, j, -v * factor);
                }
            }
        }
    }

    for i in (0..n).rev() {
        let mut acc = m.get(i, n);
        for j in i + 1..n {
            acc -= m.get(i, j) * x[j];
        }
        x[i] = acc / m.get(i, i);
    }
    Ok(())
}

/// Solve the augmented system `[A | b]` with an orthogonal row reduction.
///
/// Rows are taken largest 2-norm first, normalized and projected out of
/// the remaining rows. Rows that fall below `EPS` relative to the largest
/// are treated as the null space and dropped, so a singular system yields
/// the minimum-norm solution instead of blowing up.
pub fn solve_rq(m: &mut Matrix, rhs: Option<&[f64]>, x: &mut [f64]) -> Result<()> {
    check_augmented(m, x, rhs)?;
    let nr = m.rows;
    let nc = m.cols;
    let last = nc - 1;
    if let Some(rhs) = rhs {
        for (row, &v) in rhs.iter().enumerate() {
            m.set(row, last, v);
        }
    }

    let mut mat_scale = 0.0;
    let mut nonzero_rows = nr;
    for row in 0..nr {
        let mut max_row = row;
        let mut max_sumsq = 0.0;
        for rowp in row..nr {
            let sumsq: f64 = m.row(rowp)[..last].iter().map(|v| v * v).sum();
            if rowp == row || sumsq > max_sumsq {
                max_row = rowp;
                max_sumsq = sumsq;
            }
        }
        m.swap_rows(row, max_row);

        let row_norm = max_sumsq.sqrt();
        if row == 0 {
            mat_scale = row_norm;
        }
        if row_norm <= mat_scale * EPS {
            nonzero_rows = row;
            break;
        }

        let scale = 1.0 / row_norm;
        m.row_mut(row).iter_mut().for_each(|v| *v *= scale);
        for rowp in row + 1..nr {
            let inner: f64 = (0..last).map(|col| m.get(row, col) * m.get(rowp, col)).sum();
            if inner != 0.0 {
                for col in 0..nc {
                    let v = m.get(row, col);
                    m.add(rowp, col, -inner * v);
                }
            }
        }
    }

    x.fill(0.0);
    for row in 0..nonzero_rows {
        let r = m.row(row);
        let b = r[last];
        for (xc, &mc) in x.iter_mut().zip(&r[..last]) {
            *xc += mc * b;
        }
    }
    Ok(())
}
