//! Minimum-cost bipartite assignment (Hungarian / Munkres method).
//!
//! The engine pairs parents with offspring during crowding tournaments and
//! pairs migrants across islands, both as linear assignment problems over a
//! distance matrix. This solver implements the shortest-augmenting-path
//! formulation with dual potentials, `O((nrow + ncol)^3)`.
//!
//! Rectangular matrices are supported in both orientations. When there are
//! more rows than columns some rows stay unassigned and their entry in
//! [`Munkres::links`] is `None`.
//!
//! # References
//!
//! - Kuhn (1955), "The Hungarian Method for the Assignment Problem"
//! - Munkres (1957), "Algorithms for the Assignment and Transportation Problems"
//! - Jonker & Volgenant (1987), "A Shortest Augmenting Path Algorithm for
//!   Dense and Sparse Linear Assignment Problems"

use crate::error::{EvolveError, Result};

/// Reusable minimum-cost assignment solver.
///
/// Allocated once for a maximum problem size and fed successive cost
/// matrices of that size or smaller:
///
/// ```
/// use archipelago::munkres::Munkres;
///
/// let mut m = Munkres::new(2, 2);
/// m.set_cost_matrix(&[vec![1.0, 4.0], vec![4.0, 1.0]]);
/// m.run().unwrap();
/// assert_eq!(m.links, vec![Some(0), Some(1)]);
/// ```
#[derive(Debug, Clone)]
pub struct Munkres {
    nrow_max: usize,
    ncol_max: usize,
    nrow: usize,
    ncol: usize,
    cost: Vec<Vec<f64>>,

    /// Assigned column for each row after [`run`](Munkres::run);
    /// `None` when the row is unassigned (possible for `nrow > ncol`).
    pub links: Vec<Option<usize>>,
}

impl Munkres {
    /// Allocates a solver for problems up to `nrow x ncol`.
    pub fn new(nrow: usize, ncol: usize) -> Self {
        Self {
            nrow_max: nrow,
            ncol_max: ncol,
            nrow: nrow,
            ncol: ncol,
            cost: vec![vec![0.0; ncol]; nrow],
            links: vec![None; nrow],
        }
    }

    /// Loads a cost matrix. The matrix may be smaller than the allocated
    /// maximum but must be rectangular and non-empty.
    pub fn set_cost_matrix(&mut self, c: &[Vec<f64>]) {
        self.nrow = c.len().min(self.nrow_max);
        self.ncol = if c.is_empty() {
            0
        } else {
            c[0].len().min(self.ncol_max)
        };
        for i in 0..self.nrow {
            self.cost[i][..self.ncol].copy_from_slice(&c[i][..self.ncol]);
        }
    }

    /// Computes the minimum-cost assignment, filling [`links`](Munkres::links).
    ///
    /// Fails on an empty or non-finite cost matrix; populations are left
    /// untouched by callers in that case.
    pub fn run(&mut self) -> Result<()> {
        if self.nrow == 0 || self.ncol == 0 {
            return Err(EvolveError::Assignment(
                "cost matrix must have at least one row and one column".into(),
            ));
        }
        for row in self.cost.iter().take(self.nrow) {
            if row[..self.ncol].iter().any(|v| !v.is_finite()) {
                return Err(EvolveError::Assignment(
                    "cost matrix contains non-finite entries".into(),
                ));
            }
        }

        self.links.clear();
        self.links.resize(self.nrow, None);

        if self.nrow <= self.ncol {
            let assigned = solve_rows_le_cols(&self.cost, self.nrow, self.ncol);
            self.links[..self.nrow].copy_from_slice(&assigned);
        } else {
            // Transpose so every column finds a row, then invert the map.
            let t: Vec<Vec<f64>> = (0..self.ncol)
                .map(|j| (0..self.nrow).map(|i| self.cost[i][j]).collect())
                .collect();
            let assigned = solve_rows_le_cols(&t, self.ncol, self.nrow);
            for (j, link) in assigned.iter().enumerate() {
                if let Some(i) = link {
                    self.links[*i] = Some(j);
                }
            }
        }
        Ok(())
    }
}

/// Hungarian algorithm with potentials for `n <= m`; every row is assigned.
fn solve_rows_le_cols(cost: &[Vec<f64>], n: usize, m: usize) -> Vec<Option<usize>> {
    // 1-based arrays; p[j] holds the row matched to column j, 0 = free.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        // Augment along the alternating path back to the root.
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut links = vec![None; n];
    for j in 1..=m {
        if p[j] > 0 {
            links[p[j] - 1] = Some(j - 1);
        }
    }
    links
}
