//! Genetic operators over heterogeneous chromosomes.
//!
//! Crossover and mutation are pure functions dispatched exhaustively over
//! the gene kinds present in an individual. Discrete kinds (ints, strings,
//! keys, byte-strings, function tags) recombine with n-cut crossover;
//! float genes support several named schemes selected by configuration and
//! resolvable through an [`OperatorRegistry`] that also accepts
//! caller-registered operators.
//!
//! # Float crossover schemes
//!
//! - `"de"`: differential-evolution-inspired, `a[i] = A[i] + F * (C[i] - D[i])`
//!   per locus with probability `de_pc` (falls back to the `B - A`
//!   differential when only two parents are available)
//! - `"blend"`: BLX-alpha arithmetic blend
//! - `"sbx"`: simulated binary crossover
//!
//! # References
//!
//! - Storn & Price (1997), "Differential Evolution"
//! - Eshelman & Schaffer (1993), "Real-Coded Genetic Algorithms and
//!   Interval-Schemata"
//! - Deb & Agrawal (1995), "Simulated Binary Crossover for Continuous
//!   Search Space"
//! - Deb & Goyal (1996), "A Combined Genetic Adaptive Search (GeneAS)"

use crate::bingo::Bingo;
use crate::individual::Individual;
use crate::rng::{distinct_in_range, flip_coin};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;

/// Operator parameters shared by crossover and mutation.
#[derive(Debug, Clone)]
pub struct OpParams {
    /// Probability of applying crossover, per gene kind.
    pub pc: f64,
    /// Probability of mutating each gene locus.
    pub pm: f64,
    /// Number of cut positions for n-cut crossover.
    pub ncuts: usize,
    /// Fixed cut positions; empty means draw them at random.
    pub cuts: Vec<usize>,
    /// Named float crossover scheme, resolved via [`OperatorRegistry`].
    pub flt_cx_name: String,
    /// Per-locus recombination probability for the `"de"` scheme.
    pub de_pc: f64,
    /// Differential multiplier for the `"de"` scheme.
    pub de_mult: f64,
    /// Interval expansion for the `"blend"` scheme.
    pub blend_alpha: f64,
    /// Distribution index for the `"sbx"` scheme.
    pub sbx_eta: f64,
    /// Named float mutation scheme: `"deb"` or `"gauss"`.
    pub flt_mt_name: String,
    /// Distribution index for Deb polynomial mutation.
    pub deb_etam: f64,
    /// Relative standard deviation for Gaussian mutation.
    pub mt_sigma: f64,
    /// Whether float offspring are forced back into the gene ranges.
    pub enf_range: bool,
    /// Whether the crowding reproduction pulls two extra parents.
    pub use_4inds: bool,
    /// Per-gene float ranges, propagated from the engine configuration.
    pub xrange: Vec<(f64, f64)>,
    /// Number of bases per float gene, propagated from the configuration.
    pub nbases: usize,
}

impl Default for OpParams {
    fn default() -> Self {
        Self {
            pc: 0.8,
            pm: 0.01,
            ncuts: 2,
            cuts: Vec::new(),
            flt_cx_name: "de".into(),
            de_pc: 0.5,
            de_mult: 0.5,
            blend_alpha: 0.5,
            sbx_eta: 15.0,
            flt_mt_name: "deb".into(),
            deb_etam: 100.0,
            mt_sigma: 0.1,
            enf_range: true,
            use_4inds: true,
            xrange: Vec::new(),
            nbases: 1,
        }
    }
}

/// Float crossover function: `(a, b, parent_a, parent_b, parent_c,
/// parent_d, params, rng)`.
pub type FltCxFn = fn(
    &mut [f64],
    &mut [f64],
    &[f64],
    &[f64],
    Option<&[f64]>,
    Option<&[f64]>,
    &OpParams,
    &mut StdRng,
);

/// Registry of named float crossover operators.
///
/// The built-in schemes are pre-registered; callers may add their own
/// under a chosen identifier and select them through
/// [`OpParams::flt_cx_name`].
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    flt_cx: HashMap<String, FltCxFn>,
}

impl OperatorRegistry {
    /// Creates a registry with `"de"`, `"blend"` and `"sbx"` registered.
    pub fn with_builtins() -> Self {
        let mut flt_cx: HashMap<String, FltCxFn> = HashMap::new();
        flt_cx.insert("de".into(), de_crossover);
        flt_cx.insert("blend".into(), blend_crossover);
        flt_cx.insert("sbx".into(), sbx_crossover);
        Self { flt_cx }
    }

    /// Registers a custom float crossover under `name`.
    pub fn register_flt_cx(&mut self, name: &str, f: FltCxFn) {
        self.flt_cx.insert(name.to_string(), f);
    }

    /// Looks up a float crossover by name.
    pub fn resolve_flt_cx(&self, name: &str) -> Option<FltCxFn> {
        self.flt_cx.get(name).copied()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ============================================================================
// Crossover
// ============================================================================

/// Recombines two (or four) parents into offspring `a` and `b`.
///
/// For each gene kind present, the kind-specific scheme fires with
/// probability `pc`; otherwise `a` is an exact copy of `pa` and `b` of
/// `pb`. The extra parents `pc_ind`/`pd_ind` feed the differential term of
/// the `"de"` float scheme.
#[allow(clippy::too_many_arguments)]
pub fn crossover(
    a: &mut Individual,
    b: &mut Individual,
    pa: &Individual,
    pb: &Individual,
    pc_ind: Option<&Individual>,
    pd_ind: Option<&Individual>,
    ops: &OpParams,
    flt_cx: FltCxFn,
    rng: &mut StdRng,
) {
    if !pa.ints.is_empty() {
        if flip_coin(rng, ops.pc) {
            ncut_crossover(&mut a.ints, &mut b.ints, &pa.ints, &pb.ints, ops, rng);
        } else {
            a.ints.copy_from_slice(&pa.ints);
            b.ints.copy_from_slice(&pb.ints);
        }
    }

    if !pa.floats.is_empty() {
        if flip_coin(rng, ops.pc) {
            flt_cx(
                &mut a.floats,
                &mut b.floats,
                &pa.floats,
                &pb.floats,
                pc_ind.map(|p| p.floats.as_slice()),
                pd_ind.map(|p| p.floats.as_slice()),
                ops,
                rng,
            );
            if ops.enf_range {
                clamp_genes(&mut a.floats, ops);
                clamp_genes(&mut b.floats, ops);
            }
        } else {
            a.floats.copy_from_slice(&pa.floats);
            b.floats.copy_from_slice(&pb.floats);
        }
    }

    cross_discrete(&mut a.strings, &mut b.strings, &pa.strings, &pb.strings, ops, rng);
    cross_discrete(&mut a.keys, &mut b.keys, &pa.keys, &pb.keys, ops, rng);
    cross_discrete(&mut a.bytes, &mut b.bytes, &pa.bytes, &pb.bytes, ops, rng);
    cross_discrete(&mut a.funcs, &mut b.funcs, &pa.funcs, &pb.funcs, ops, rng);
}

fn cross_discrete<T: Clone, R: Rng>(
    a: &mut [T],
    b: &mut [T],
    pa: &[T],
    pb: &[T],
    ops: &OpParams,
    rng: &mut R,
) {
    if pa.is_empty() {
        return;
    }
    if flip_coin(rng, ops.pc) {
        ncut_crossover(a, b, pa, pb, ops, rng);
    } else {
        a.clone_from_slice(pa);
        b.clone_from_slice(pb);
    }
}

/// n-cut crossover: alternate parent segments between cut positions.
///
/// Cut positions live in `[1, len - 1]`; they come from `ops.cuts` when
/// set, otherwise `ops.ncuts` positions are drawn without repetition.
/// Segments at even index copy straight (`pa` into `a`), odd segments
/// swap.
pub fn ncut_crossover<T: Clone, R: Rng>(
    a: &mut [T],
    b: &mut [T],
    pa: &[T],
    pb: &[T],
    ops: &OpParams,
    rng: &mut R,
) {
    let len = pa.len();
    if len < 2 {
        a.clone_from_slice(pa);
        b.clone_from_slice(pb);
        return;
    }
    let cuts: Vec<usize> = if ops.cuts.is_empty() {
        distinct_in_range(rng, ops.ncuts.max(1), 1, len)
    } else {
        let mut c: Vec<usize> = ops.cuts.iter().copied().filter(|&p| p >= 1 && p < len).collect();
        c.sort_unstable();
        c.dedup();
        c
    };

    let mut start = 0usize;
    let mut swap = false;
    for &cut in cuts.iter().chain(std::iter::once(&len)) {
        if swap {
            a[start..cut].clone_from_slice(&pb[start..cut]);
            b[start..cut].clone_from_slice(&pa[start..cut]);
        } else {
            a[start..cut].clone_from_slice(&pa[start..cut]);
            b[start..cut].clone_from_slice(&pb[start..cut]);
        }
        swap = !swap;
        start = cut;
    }
}

/// Differential-evolution float crossover.
///
/// Per locus with probability `de_pc`: `a[i] = pa[i] + de_mult * (pc[i] -
/// pd[i])`, else `a[i] = pa[i]`; `b` mirrors with swapped differential.
/// Without the extra parents the differential degrades to `pb - pa`.
pub fn de_crossover(
    a: &mut [f64],
    b: &mut [f64],
    pa: &[f64],
    pb: &[f64],
    pc: Option<&[f64]>,
    pd: Option<&[f64]>,
    ops: &OpParams,
    rng: &mut StdRng,
) {
    for i in 0..pa.len() {
        let (d1, d2) = match (pc, pd) {
            (Some(c), Some(d)) => (c[i] - d[i], d[i] - c[i]),
            _ => (pb[i] - pa[i], pa[i] - pb[i]),
        };
        a[i] = if flip_coin(rng, ops.de_pc) {
            pa[i] + ops.de_mult * d1
        } else {
            pa[i]
        };
        b[i] = if flip_coin(rng, ops.de_pc) {
            pb[i] + ops.de_mult * d2
        } else {
            pb[i]
        };
    }
}

/// BLX-alpha blend crossover: each child locus is drawn uniformly from the
/// parent interval expanded by `blend_alpha` on both sides.
pub fn blend_crossover(
    a: &mut [f64],
    b: &mut [f64],
    pa: &[f64],
    pb: &[f64],
    _pc: Option<&[f64]>,
    _pd: Option<&[f64]>,
    ops: &OpParams,
    rng: &mut StdRng,
) {
    for i in 0..pa.len() {
        let lo = pa[i].min(pb[i]);
        let hi = pa[i].max(pb[i]);
        let d = hi - lo;
        if d < 1e-15 {
            a[i] = pa[i];
            b[i] = pb[i];
            continue;
        }
        let (xlo, xhi) = (lo - ops.blend_alpha * d, hi + ops.blend_alpha * d);
        a[i] = rng.random_range(xlo..xhi);
        b[i] = rng.random_range(xlo..xhi);
    }
}

/// Simulated binary crossover (Deb & Agrawal 1995).
pub fn sbx_crossover(
    a: &mut [f64],
    b: &mut [f64],
    pa: &[f64],
    pb: &[f64],
    _pc: Option<&[f64]>,
    _pd: Option<&[f64]>,
    ops: &OpParams,
    rng: &mut StdRng,
) {
    let exp = 1.0 / (ops.sbx_eta + 1.0);
    for i in 0..pa.len() {
        let u: f64 = rng.random_range(0.0..1.0);
        let beta = if u <= 0.5 {
            (2.0 * u).powf(exp)
        } else {
            (1.0 / (2.0 * (1.0 - u))).powf(exp)
        };
        a[i] = 0.5 * ((1.0 + beta) * pa[i] + (1.0 - beta) * pb[i]);
        b[i] = 0.5 * ((1.0 - beta) * pa[i] + (1.0 + beta) * pb[i]);
    }
}

/// Forces every logical float gene back into its configured range by
/// rescaling its bases proportionally.
pub fn clamp_genes(floats: &mut [f64], ops: &OpParams) {
    if ops.xrange.is_empty() {
        return;
    }
    let nbases = ops.nbases.max(1);
    let ngenes = (floats.len() / nbases).min(ops.xrange.len());
    for (g, &(lo, hi)) in ops.xrange.iter().take(ngenes).enumerate() {
        let bases = &mut floats[g * nbases..(g + 1) * nbases];
        let sum: f64 = bases.iter().sum();
        let target = sum.clamp(lo, hi);
        if (target - sum).abs() < f64::EPSILON {
            continue;
        }
        if sum.abs() < f64::MIN_POSITIVE {
            let share = target / nbases as f64;
            bases.iter_mut().for_each(|b| *b = share);
        } else {
            let factor = target / sum;
            bases.iter_mut().for_each(|b| *b *= factor);
        }
    }
}

// ============================================================================
// Mutation
// ============================================================================

/// Mutates every gene kind of `ind` in place, locus by locus with
/// probability `pm`. Pool-backed kinds draw replacements from `bingo`.
pub fn mutate(ind: &mut Individual, ops: &OpParams, bingo: &Bingo, rng: &mut StdRng) {
    int_mutation(&mut ind.ints, ops, bingo, rng);
    if !ind.floats.is_empty() {
        flt_mutation(&mut ind.floats, ops, rng);
    }
    for s in ind.strings.iter_mut() {
        if flip_coin(rng, ops.pm) {
            if let Some(t) = bingo.draw_string(rng) {
                *s = t;
            }
        }
    }
    for k in ind.keys.iter_mut() {
        if flip_coin(rng, ops.pm) {
            if let Some(t) = bingo.draw_key(rng) {
                *k = t;
            }
        }
    }
    for b in ind.bytes.iter_mut() {
        if flip_coin(rng, ops.pm) {
            if let Some(t) = bingo.draw_bytes(rng) {
                *b = t;
            }
        }
    }
    for f in ind.funcs.iter_mut() {
        if flip_coin(rng, ops.pm) {
            if let Some(t) = bingo.draw_func(rng) {
                *f = t;
            }
        }
    }
}

/// Integer mutation: redraw from the pool when one is configured, else a
/// unit step in a random direction.
pub fn int_mutation<R: Rng>(ints: &mut [i64], ops: &OpParams, bingo: &Bingo, rng: &mut R) {
    for x in ints.iter_mut() {
        if !flip_coin(rng, ops.pm) {
            continue;
        }
        if bingo.has_int_pool() {
            *x = bingo.draw_int(rng);
        } else if flip_coin(rng, 0.5) {
            *x += 1;
        } else {
            *x -= 1;
        }
    }
}

/// Float mutation: Gaussian or Deb polynomial perturbation per base, then
/// range enforcement on the logical genes.
pub fn flt_mutation(floats: &mut [f64], ops: &OpParams, rng: &mut StdRng) {
    let nbases = ops.nbases.max(1);
    let deb = ops.flt_mt_name != "gauss";
    for i in 0..floats.len() {
        if !flip_coin(rng, ops.pm) {
            continue;
        }
        let gene = i / nbases;
        let range = ops.xrange.get(gene).copied();
        if deb {
            if let Some((lo, hi)) = range {
                let share = (hi - lo) / nbases as f64;
                let x = floats[i];
                // Base bounds: the gene's per-base share, widened to keep
                // the current value inside the interval.
                let blo = (lo / nbases as f64).min(x);
                let bhi = (hi / nbases as f64).max(x);
                floats[i] = deb_polynomial(x, blo, bhi, share, ops.deb_etam, rng);
                continue;
            }
        }
        let sd = match range {
            Some((lo, hi)) => ops.mt_sigma * (hi - lo) / nbases as f64,
            None => ops.mt_sigma,
        };
        let normal = Normal::new(0.0, sd.abs().max(f64::MIN_POSITIVE))
            .expect("standard deviation is finite and positive");
        floats[i] += normal.sample(rng);
    }
    if ops.enf_range {
        clamp_genes(floats, ops);
    }
}

/// Deb polynomial perturbation with distribution index `etam` over the
/// interval `[lo, hi]`; `span` scales the applied delta.
fn deb_polynomial<R: Rng>(x: f64, lo: f64, hi: f64, span: f64, etam: f64, rng: &mut R) -> f64 {
    let width = hi - lo;
    if width < 1e-15 {
        return x;
    }
    let u: f64 = rng.random_range(0.0..1.0);
    let mpow = 1.0 / (etam + 1.0);
    let deltaq = if u <= 0.5 {
        let d1 = (x - lo) / width;
        let val = 2.0 * u + (1.0 - 2.0 * u) * (1.0 - d1).powf(etam + 1.0);
        val.powf(mpow) - 1.0
    } else {
        let d2 = (hi - x) / width;
        let val = 2.0 * (1.0 - u) + 2.0 * (u - 0.5) * (1.0 - d2).powf(etam + 1.0);
        1.0 - val.powf(mpow)
    };
    x + deltaq * span
}
