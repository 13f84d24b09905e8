//! Populations: ordered collections of individuals with demerit-based
//! total ordering.
//!
//! The demerit unifies feasible and unfeasible individuals in one scalar:
//! objective columns are scaled to `[0, 1]` with per-population min/max
//! and summed; any constraint violation shifts the individual past every
//! feasible one. Sorting is stable, so ties keep insertion order.

use crate::config::EvolverConfig;
use crate::individual::{compare_det, Individual};
use crate::rng::create_rng;
use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;
use std::ops::{Deref, DerefMut};

/// An ordered multiset of owned individuals.
#[derive(Debug, Clone, Default)]
pub struct Population(Vec<Individual>);

impl Population {
    /// Wraps a vector of individuals.
    pub fn new(inds: Vec<Individual>) -> Self {
        Self(inds)
    }

    /// Returns a deep copy.
    pub fn get_copy(&self) -> Self {
        self.clone()
    }

    /// Sorts ascending by demerit (best first). Stable: equal demerits
    /// keep their insertion order.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| {
            a.demerit
                .partial_cmp(&b.demerit)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Sorts by rank: descending score, ascending demerit on ties.
    ///
    /// Migration relies on this layout: the first individuals are the
    /// island's best, the last are its worst.
    pub fn sort_by_rank(&mut self) {
        self.0.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| {
                    a.demerit
                        .partial_cmp(&b.demerit)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
    }

    /// Computes demerits for the whole population.
    ///
    /// Each objective column is scaled linearly to `[0, 1]` using the
    /// population's min/max (a spread below `1e-16` collapses to zero) and
    /// the scaled values are summed. Unfeasible individuals restart from
    /// `nova + 1` plus their scaled violations, which places every one of
    /// them strictly after all feasible individuals.
    pub fn compute_demerits(&mut self) {
        if self.0.is_empty() {
            return;
        }
        let nova = self.0[0].ovas.len();
        let noor = self.0[0].oors.len();

        for ind in self.0.iter_mut() {
            ind.demerit = 0.0;
        }
        for j in 0..nova {
            let (lo, hi) = self.column_span(j, false);
            let spread = hi - lo;
            if spread > 1e-16 {
                for ind in self.0.iter_mut() {
                    ind.demerit += (ind.ovas[j] - lo) / spread;
                }
            }
        }

        let shift = nova as f64 + 1.0;
        let oor_spans: Vec<(f64, f64)> = (0..noor).map(|j| self.column_span(j, true)).collect();
        for ind in self.0.iter_mut() {
            if ind.feasible() {
                continue;
            }
            ind.demerit = shift;
            for (j, &(lo, hi)) in oor_spans.iter().enumerate() {
                if ind.oors[j] > 0.0 {
                    let spread = hi - lo;
                    if spread > 1e-16 {
                        ind.demerit += (ind.oors[j] - lo) / spread;
                    }
                }
            }
        }
    }

    /// Computes each individual's score: the number of individuals it
    /// dominates under the deterministic comparison.
    pub fn compute_scores(&mut self) {
        let n = self.0.len();
        let mut scores = vec![0i32; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let (i_dom, j_dom) = compare_det(&self.0[i], &self.0[j]);
                if i_dom {
                    scores[i] += 1;
                }
                if j_dom {
                    scores[j] += 1;
                }
            }
        }
        for (ind, s) in self.0.iter_mut().zip(scores) {
            ind.score = s;
        }
    }

    fn column_span(&self, j: usize, oor: bool) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for ind in self.0.iter() {
            let v = if oor { ind.oors[j] } else { ind.ovas[j] };
            lo = lo.min(v);
            hi = hi.max(v);
        }
        (lo, hi)
    }

    /// Renders the population as a text table (Ova | Oor | Demerit | Genes).
    pub fn output_table(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(72);
        let thin = "-".repeat(72);
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!(
            "{:>24} {:>12} {:>12}  {}\n",
            "Ova", "Oor", "Demerit", "Genes"
        ));
        out.push_str(&thin);
        out.push('\n');
        for ind in self.0.iter() {
            let ovas = ind
                .ovas
                .iter()
                .map(|v| format!("{v:.6}"))
                .collect::<Vec<_>>()
                .join(" ");
            let oor: f64 = ind.oors.iter().sum();
            let oor_str = if ind.feasible() {
                "n/a".to_string()
            } else {
                format!("{oor:.6}")
            };
            out.push_str(&format!(
                "{ovas:>24} {oor_str:>12} {:>12.6} {}\n",
                ind.demerit,
                ind.format_genes()
            ));
        }
        out.push_str(&rule);
        out.push('\n');
        out
    }

    /// Dumps the raw float bases, one individual per line.
    pub fn out_float_bases(&self) -> String {
        let mut out = String::new();
        for ind in self.0.iter() {
            for x in &ind.floats {
                out.push_str(&format!(" {x:10.4}"));
            }
            out.push('\n');
        }
        out
    }

    /// Serializable snapshot of the population.
    pub fn to_record(&self, island: usize) -> PopulationRecord {
        PopulationRecord {
            island,
            individuals: self.0.iter().map(IndividualRecord::from).collect(),
        }
    }
}

impl Deref for Population {
    type Target = Vec<Individual>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Population {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Serializable snapshot of one individual.
#[derive(Debug, Clone, Serialize)]
pub struct IndividualRecord {
    pub ovas: Vec<f64>,
    pub oors: Vec<f64>,
    pub demerit: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ints: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub floats: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub strings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bytes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub funcs: Vec<String>,
}

impl From<&Individual> for IndividualRecord {
    fn from(ind: &Individual) -> Self {
        Self {
            ovas: ind.ovas.clone(),
            oors: ind.oors.clone(),
            demerit: ind.demerit,
            ints: ind.ints.clone(),
            floats: ind.get_floats(),
            strings: ind.strings.clone(),
            keys: ind.keys.clone(),
            bytes: ind
                .bytes
                .iter()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .collect(),
            funcs: ind.funcs.iter().map(|f| f(ind)).collect(),
        }
    }
}

/// Serializable snapshot of one island's population.
#[derive(Debug, Clone, Serialize)]
pub struct PopulationRecord {
    pub island: usize,
    pub individuals: Vec<IndividualRecord>,
}

// ============================================================================
// Built-in generators
// ============================================================================

/// Float-chromosome population generator with grid, Latin-hypercube and
/// uniform modes.
///
/// Grid mode places `npts = floor(ninds^(1/ngenes))` nodes per dimension;
/// the first `npts^ngenes` individuals land on the grid nodes (optionally
/// jittered by `noise`) and the remainder is drawn uniformly inside
/// `range_flt`. Latin-hypercube mode stratifies every dimension into
/// `ninds` cells and shuffles the strata independently per dimension.
pub fn pop_flt_gen(_id: usize, conf: &EvolverConfig, rng: &mut StdRng) -> Population {
    let ngenes = conf.range_flt.len();
    let mut inds: Vec<Individual> = (0..conf.ninds)
        .map(|_| {
            Individual::new(conf.nova, conf.noor).with_floats(
                &vec![0.0; ngenes],
                conf.nbases,
                rng,
            )
        })
        .collect();

    if conf.latin {
        latin_fill(&mut inds, &conf.range_flt, rng);
    } else if conf.grid {
        grid_fill(&mut inds, &conf.range_flt, conf.noise, rng);
    } else {
        for ind in inds.iter_mut() {
            for (g, &(lo, hi)) in conf.range_flt.iter().enumerate() {
                ind.set_float(g, uniform_in(lo, hi, rng), rng);
            }
        }
    }
    Population::new(inds)
}

fn grid_fill<R: Rng>(inds: &mut [Individual], ranges: &[(f64, f64)], noise: f64, rng: &mut R) {
    let ninds = inds.len();
    let ngenes = ranges.len();
    let npts = (ninds as f64).powf(1.0 / ngenes as f64).floor() as usize;
    let ntot = npts.pow(ngenes as u32);
    let den = if npts > 1 { (npts - 1) as f64 } else { 1.0 };

    for (i, ind) in inds.iter_mut().enumerate() {
        if i < ntot {
            let mut leftover = i;
            for (g, &(lo, hi)) in ranges.iter().enumerate() {
                let rdim = npts.pow((ngenes - 1 - g) as u32);
                let idx = leftover / rdim;
                leftover %= rdim;
                let mut x = lo + idx as f64 * (hi - lo) / den;
                if noise > 0.0 {
                    let mul = rng.random_range(0.0..noise);
                    if rng.random_bool(0.5) {
                        x += mul * x;
                    } else {
                        x -= mul * x;
                    }
                    x = x.clamp(lo, hi);
                }
                ind.set_float(g, x, rng);
            }
        } else {
            for (g, &(lo, hi)) in ranges.iter().enumerate() {
                ind.set_float(g, uniform_in(lo, hi, rng), rng);
            }
        }
    }
}

fn latin_fill<R: Rng>(inds: &mut [Individual], ranges: &[(f64, f64)], rng: &mut R) {
    use rand::seq::SliceRandom;
    let ninds = inds.len();
    for (g, &(lo, hi)) in ranges.iter().enumerate() {
        let mut strata: Vec<usize> = (0..ninds).collect();
        strata.shuffle(rng);
        let cell = (hi - lo) / ninds as f64;
        for (ind, &s) in inds.iter_mut().zip(strata.iter()) {
            let x = lo + (s as f64 + rng.random_range(0.0..1.0)) * cell;
            ind.set_float(g, x.min(hi), rng);
        }
    }
}

fn uniform_in<R: Rng>(lo: f64, hi: f64, rng: &mut R) -> f64 {
    if hi > lo {
        rng.random_range(lo..hi)
    } else {
        lo
    }
}

/// Generates a population by cloning a reference individual and redrawing
/// every gene from a [`Bingo`](crate::bingo::Bingo) pool.
pub fn pop_random_gen(
    ninds: usize,
    reference: &Individual,
    bingo: &crate::bingo::Bingo,
    rng: &mut StdRng,
) -> Population {
    let mut inds = vec![reference.get_copy(); ninds];
    for ind in inds.iter_mut() {
        for j in 0..ind.ints.len() {
            ind.ints[j] = bingo.draw_int(rng);
        }
        for g in 0..ind.nfltgenes {
            let x = bingo.draw_float(g, rng);
            ind.set_float(g, x, rng);
        }
        for j in 0..ind.strings.len() {
            if let Some(s) = bingo.draw_string(rng) {
                ind.strings[j] = s;
            }
        }
        for j in 0..ind.keys.len() {
            if let Some(k) = bingo.draw_key(rng) {
                ind.keys[j] = k;
            }
        }
        for j in 0..ind.bytes.len() {
            if let Some(b) = bingo.draw_bytes(rng) {
                ind.bytes[j] = b;
            }
        }
        for j in 0..ind.funcs.len() {
            if let Some(f) = bingo.draw_func(rng) {
                ind.funcs[j] = f;
            }
        }
    }
    Population::new(inds)
}

/// Convenience constructor: a population of float chromosomes from
/// explicit gene values, one row per individual.
pub fn pop_float_chromo(nova: usize, noor: usize, nbases: usize, genes: &[Vec<f64>]) -> Population {
    let mut rng = create_rng(0);
    Population::new(
        genes
            .iter()
            .map(|row| Individual::new(nova, noor).with_floats(row, nbases, &mut rng))
            .collect(),
    )
}
