//! Candidate solutions with heterogeneous chromosomes.
//!
//! An [`Individual`] carries up to six kinds of genes (integers, floats,
//! strings, keys, byte-strings, function tags), its objective values
//! (`ovas`, minimized), its constraint-violation magnitudes (`oors`, zero
//! means feasible) and a scalar `demerit` used to totally order a
//! population.
//!
//! Float genes support a multi-base representation: each logical gene is
//! split into `nbases` summands whose sum equals the gene value. With
//! `nbases > 1` deviation-based diversity tracking sees more degrees of
//! freedom; accessors keep the split transparent.

use rand::Rng;

/// A function gene: maps the individual to a display value.
///
/// The engine treats the returned string as opaque; function genes
/// participate in crossover and mutation as plain tags.
pub type GeneFunc = fn(&Individual) -> String;

/// One candidate solution.
#[derive(Clone, Debug, PartialEq)]
pub struct Individual {
    /// Objective values, minimized. Length fixed at construction.
    pub ovas: Vec<f64>,
    /// Out-of-range values: non-negative distances to violated constraints.
    /// All zero means feasible.
    pub oors: Vec<f64>,
    /// Scalar ranking key; lower is better. See
    /// [`Population::compute_demerits`](crate::population::Population::compute_demerits).
    pub demerit: f64,
    /// Domination count used as a secondary ranking key by migration.
    pub score: i32,
    /// Number of logical float genes.
    pub nfltgenes: usize,
    /// Number of bases each float gene is split into.
    pub nbases: usize,

    /// Integer genes.
    pub ints: Vec<i64>,
    /// Float bases, `nfltgenes * nbases` entries.
    pub floats: Vec<f64>,
    /// String genes.
    pub strings: Vec<String>,
    /// Single-byte genes.
    pub keys: Vec<u8>,
    /// Byte-string genes of possibly differing lengths.
    pub bytes: Vec<Vec<u8>>,
    /// Function-tag genes.
    pub funcs: Vec<GeneFunc>,
}

impl Individual {
    /// Creates an individual with empty chromosome and zeroed objective
    /// storage for `nova` objectives and `noor` constraints.
    pub fn new(nova: usize, noor: usize) -> Self {
        Self {
            ovas: vec![0.0; nova],
            oors: vec![0.0; noor],
            demerit: 0.0,
            score: 0,
            nfltgenes: 0,
            nbases: 1,
            ints: Vec::new(),
            floats: Vec::new(),
            strings: Vec::new(),
            keys: Vec::new(),
            bytes: Vec::new(),
            funcs: Vec::new(),
        }
    }

    /// Sets the integer genes.
    pub fn with_ints(mut self, ints: &[i64]) -> Self {
        self.ints = ints.to_vec();
        self
    }

    /// Sets the float genes, splitting each logical value into `nbases`
    /// random summands when `nbases > 1`.
    pub fn with_floats<R: Rng>(mut self, genes: &[f64], nbases: usize, rng: &mut R) -> Self {
        let nbases = nbases.max(1);
        self.nfltgenes = genes.len();
        self.nbases = nbases;
        self.floats = vec![0.0; genes.len() * nbases];
        for (g, &x) in genes.iter().enumerate() {
            split_gene(&mut self.floats[g * nbases..(g + 1) * nbases], x, rng);
        }
        self
    }

    /// Sets the string genes.
    pub fn with_strings(mut self, strings: &[&str]) -> Self {
        self.strings = strings.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Sets the key genes.
    pub fn with_keys(mut self, keys: &[u8]) -> Self {
        self.keys = keys.to_vec();
        self
    }

    /// Sets the byte-string genes.
    pub fn with_bytes(mut self, bytes: &[&[u8]]) -> Self {
        self.bytes = bytes.iter().map(|b| b.to_vec()).collect();
        self
    }

    /// Sets the function-tag genes.
    pub fn with_funcs(mut self, funcs: &[GeneFunc]) -> Self {
        self.funcs = funcs.to_vec();
        self
    }

    /// Returns a deep copy.
    pub fn get_copy(&self) -> Self {
        self.clone()
    }

    /// Copies this individual into a pre-allocated destination of the same
    /// chromosome shape, without allocating for fixed-size gene kinds.
    ///
    /// This is the tournament hot path; `dst` must come from the same
    /// population (same gene counts and base split).
    pub fn copy_into(&self, dst: &mut Individual) {
        dst.ovas.copy_from_slice(&self.ovas);
        dst.oors.copy_from_slice(&self.oors);
        dst.demerit = self.demerit;
        dst.score = self.score;
        dst.nfltgenes = self.nfltgenes;
        dst.nbases = self.nbases;
        dst.ints.copy_from_slice(&self.ints);
        dst.floats.copy_from_slice(&self.floats);
        for (d, s) in dst.strings.iter_mut().zip(&self.strings) {
            d.clone_from(s);
        }
        dst.keys.copy_from_slice(&self.keys);
        for (d, s) in dst.bytes.iter_mut().zip(&self.bytes) {
            d.clone_from(s);
        }
        dst.funcs.copy_from_slice(&self.funcs);
    }

    /// Logical value of float gene `g`: the sum of its bases.
    pub fn get_float(&self, g: usize) -> f64 {
        if self.nbases > 1 {
            self.floats[g * self.nbases..(g + 1) * self.nbases]
                .iter()
                .sum()
        } else {
            self.floats[g]
        }
    }

    /// Sets float gene `g` to `x`, re-randomizing the base split when
    /// `nbases > 1`.
    pub fn set_float<R: Rng>(&mut self, g: usize, x: f64, rng: &mut R) {
        if self.nbases > 1 {
            split_gene(&mut self.floats[g * self.nbases..(g + 1) * self.nbases], x, rng);
        } else {
            self.floats[g] = x;
        }
    }

    /// All logical float gene values.
    pub fn get_floats(&self) -> Vec<f64> {
        (0..self.nfltgenes).map(|g| self.get_float(g)).collect()
    }

    /// Whether all constraint-violation values are zero.
    pub fn feasible(&self) -> bool {
        self.oors.iter().all(|&v| v <= 0.0)
    }

    /// Renders the genes as a single display line for reports.
    pub fn format_genes(&self) -> String {
        let mut line = String::new();
        for x in &self.ints {
            line.push_str(&format!(" {x}"));
        }
        for g in 0..self.nfltgenes {
            line.push_str(&format!(" {}", self.get_float(g)));
        }
        for s in &self.strings {
            line.push_str(&format!(" {s:?}"));
        }
        for k in &self.keys {
            line.push_str(&format!(" {k:02x}"));
        }
        for b in &self.bytes {
            line.push_str(&format!(" {:?}", String::from_utf8_lossy(b)));
        }
        for f in &self.funcs {
            line.push_str(&format!(" {:?}", f(self)));
        }
        line
    }
}

/// Splits `x` into random non-negative fractions summing to `x`.
fn split_gene<R: Rng>(bases: &mut [f64], x: f64, rng: &mut R) {
    if bases.len() == 1 {
        bases[0] = x;
        return;
    }
    let mut sum = 0.0;
    for b in bases.iter_mut() {
        *b = rng.random_range(0.0..1.0);
        sum += *b;
    }
    if sum < f64::MIN_POSITIVE {
        let share = x / bases.len() as f64;
        bases.iter_mut().for_each(|b| *b = share);
        return;
    }
    for b in bases.iter_mut() {
        *b = x * *b / sum;
    }
}

// ============================================================================
// Dominance comparison
// ============================================================================

/// Deterministic comparison unifying feasible and unfeasible individuals.
///
/// Returns `(a_dominates, b_dominates)`:
///
/// - both feasible: Pareto dominance over objective values;
/// - exactly one feasible: the feasible one dominates;
/// - both unfeasible: Pareto dominance over constraint violations.
///
/// At most one of the two flags is `true`; neither may dominate.
pub fn compare_det(a: &Individual, b: &Individual) -> (bool, bool) {
    match (a.feasible(), b.feasible()) {
        (true, true) => pareto_min(&a.ovas, &b.ovas),
        (true, false) => (true, false),
        (false, true) => (false, true),
        (false, false) => pareto_min(&a.oors, &b.oors),
    }
}

/// Probabilistic comparison: returns `true` when `a` wins.
///
/// Strict dominance wins outright. Otherwise `a` wins the draw with
/// probability `pa / (pa + pb)` where `px = 1 / (1 + kx * phi)` and `kx`
/// counts the components in which `x` is worse. With `phi = 0` this
/// reduces to strict dominance plus a fair coin on incomparable pairs.
pub fn compare_prob<R: Rng>(a: &Individual, b: &Individual, phi: f64, rng: &mut R) -> bool {
    match (a.feasible(), b.feasible()) {
        (true, true) => pareto_min_prob(&a.ovas, &b.ovas, phi, rng),
        (true, false) => true,
        (false, true) => false,
        (false, false) => pareto_min_prob(&a.oors, &b.oors, phi, rng),
    }
}

/// Pareto comparison for minimization: `(u_dominates, v_dominates)`.
fn pareto_min(u: &[f64], v: &[f64]) -> (bool, bool) {
    let mut u_better = false;
    let mut v_better = false;
    for (&x, &y) in u.iter().zip(v.iter()) {
        if x < y {
            u_better = true;
        } else if y < x {
            v_better = true;
        }
    }
    (u_better && !v_better, v_better && !u_better)
}

fn pareto_min_prob<R: Rng>(u: &[f64], v: &[f64], phi: f64, rng: &mut R) -> bool {
    let mut ku = 0usize;
    let mut kv = 0usize;
    for (&x, &y) in u.iter().zip(v.iter()) {
        if x > y {
            ku += 1;
        } else if y > x {
            kv += 1;
        }
    }
    if ku == 0 && kv > 0 {
        return true;
    }
    if kv == 0 && ku > 0 {
        return false;
    }
    let pu = 1.0 / (1.0 + ku as f64 * phi.max(0.0));
    let pv = 1.0 / (1.0 + kv as f64 * phi.max(0.0));
    rng.random_bool(pu / (pu + pv))
}

// ============================================================================
// Distance
// ============================================================================

/// Per-gene spans used to normalize [`distance`].
///
/// Spans come from one population, or from the union of two populations
/// during migration, where the objective span is global across all islands.
#[derive(Debug, Clone, Default)]
pub struct DistanceSpan {
    pub int_min: Vec<i64>,
    pub int_max: Vec<i64>,
    pub flt_min: Vec<f64>,
    pub flt_max: Vec<f64>,
    pub ova_min: Vec<f64>,
    pub ova_max: Vec<f64>,
}

impl DistanceSpan {
    /// Allocates a span for the given chromosome shape.
    pub fn new(nints: usize, nflts: usize, nova: usize) -> Self {
        Self {
            int_min: vec![0; nints],
            int_max: vec![0; nints],
            flt_min: vec![0.0; nflts],
            flt_max: vec![0.0; nflts],
            ova_min: vec![0.0; nova],
            ova_max: vec![0.0; nova],
        }
    }

    /// Resets the span to the first individual of a sequence.
    pub fn reset_from(&mut self, ind: &Individual) {
        for (j, &x) in ind.ints.iter().enumerate() {
            self.int_min[j] = x;
            self.int_max[j] = x;
        }
        for (j, &x) in ind.floats.iter().enumerate() {
            self.flt_min[j] = x;
            self.flt_max[j] = x;
        }
        for (j, &x) in ind.ovas.iter().enumerate() {
            self.ova_min[j] = x;
            self.ova_max[j] = x;
        }
    }

    /// Widens the span to include another individual.
    pub fn absorb(&mut self, ind: &Individual) {
        for (j, &x) in ind.ints.iter().enumerate() {
            self.int_min[j] = self.int_min[j].min(x);
            self.int_max[j] = self.int_max[j].max(x);
        }
        for (j, &x) in ind.floats.iter().enumerate() {
            self.flt_min[j] = self.flt_min[j].min(x);
            self.flt_max[j] = self.flt_max[j].max(x);
        }
        for (j, &x) in ind.ovas.iter().enumerate() {
            self.ova_min[j] = self.ova_min[j].min(x);
            self.ova_max[j] = self.ova_max[j].max(x);
        }
    }

    /// Overrides the objective span, e.g. with the global min/max across
    /// all islands during migration.
    pub fn set_ova_span(&mut self, ova_min: &[f64], ova_max: &[f64]) {
        self.ova_min.copy_from_slice(ova_min);
        self.ova_max.copy_from_slice(ova_max);
    }
}

/// Normalized L1 distance between two individuals.
///
/// Numeric kinds (ints, float bases and, when `dist_ovs` is set, objective
/// values) are normalized by the span's per-gene min/max; a zero span
/// contributes zero. Discrete kinds contribute their mismatch fraction.
/// Contributions are averaged per kind, then summed.
pub fn distance(a: &Individual, b: &Individual, span: &DistanceSpan, dist_ovs: bool) -> f64 {
    let mut total = 0.0;

    if !a.ints.is_empty() {
        let mut d = 0.0;
        for (j, (&x, &y)) in a.ints.iter().zip(b.ints.iter()).enumerate() {
            let range = (span.int_max[j] - span.int_min[j]) as f64;
            if range > 0.0 {
                d += (x - y).abs() as f64 / range;
            }
        }
        total += d / a.ints.len() as f64;
    }

    if !a.floats.is_empty() {
        let mut d = 0.0;
        for (j, (&x, &y)) in a.floats.iter().zip(b.floats.iter()).enumerate() {
            let range = span.flt_max[j] - span.flt_min[j];
            if range > 0.0 {
                d += (x - y).abs() / range;
            }
        }
        total += d / a.floats.len() as f64;
    }

    total += mismatch_fraction(&a.strings, &b.strings);
    total += mismatch_fraction(&a.keys, &b.keys);
    total += mismatch_fraction(&a.bytes, &b.bytes);
    total += mismatch_fraction(&a.funcs, &b.funcs);

    if dist_ovs && !a.ovas.is_empty() {
        let mut d = 0.0;
        for (j, (&x, &y)) in a.ovas.iter().zip(b.ovas.iter()).enumerate() {
            let range = span.ova_max[j] - span.ova_min[j];
            if range > 0.0 {
                d += (x - y).abs() / range;
            }
        }
        total += d / a.ovas.len() as f64;
    }

    total
}

fn mismatch_fraction<T: PartialEq>(a: &[T], b: &[T]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let mismatches = a.iter().zip(b.iter()).filter(|(x, y)| x != y).count();
    mismatches as f64 / a.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

    fn tag_alpha(_: &Individual) -> String {
        "alpha".into()
    }

    fn tag_beta(_: &Individual) -> String {
        "beta".into()
    }

    fn full_individual() -> Individual {
        let mut rng = create_rng(42);
        Individual::new(2, 1)
            .with_ints(&[3, -7, 11])
            .with_floats(&[1.5, -2.25], 3, &mut rng)
            .with_strings(&["left", "right"])
            .with_keys(&[0x0a, 0xff])
            .with_bytes(&[b"abc".as_slice(), b"de".as_slice()])
            .with_funcs(&[tag_alpha, tag_beta])
    }

    #[test]
    fn test_float_logical_value_law() {
        let mut rng = create_rng(42);
        for nbases in [1, 2, 3, 5] {
            let ind = Individual::new(1, 0).with_floats(&[4.5, -1.25, 0.0], nbases, &mut rng);
            assert_eq!(ind.floats.len(), 3 * nbases);
            for (g, &expect) in [4.5, -1.25, 0.0].iter().enumerate() {
                let sum: f64 = ind.floats[g * nbases..(g + 1) * nbases].iter().sum();
                assert!((sum - expect).abs() < 1e-12, "nbases={nbases} gene={g}");
                assert!((ind.get_float(g) - expect).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_set_float_preserves_sum() {
        let mut rng = create_rng(42);
        let mut ind = Individual::new(1, 0).with_floats(&[1.0, 2.0], 4, &mut rng);
        ind.set_float(1, -3.75, &mut rng);
        assert!((ind.get_float(1) - (-3.75)).abs() < 1e-12);
        assert!((ind.get_float(0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_copy_roundtrip_all_kinds() {
        let src = full_individual();
        let copy = src.get_copy();
        assert_eq!(copy, src);

        // In-place copy into a same-shape destination.
        let mut rng = create_rng(99);
        let mut dst = Individual::new(2, 1)
            .with_ints(&[0, 0, 0])
            .with_floats(&[0.0, 0.0], 3, &mut rng)
            .with_strings(&["", ""])
            .with_keys(&[0, 0])
            .with_bytes(&[b"xxx".as_slice(), b"yy".as_slice()])
            .with_funcs(&[tag_beta, tag_beta]);
        src.copy_into(&mut dst);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_feasible() {
        let mut ind = Individual::new(1, 2);
        assert!(ind.feasible());
        ind.oors[1] = 0.5;
        assert!(!ind.feasible());
    }

    #[test]
    fn test_compare_det_both_feasible() {
        let mut a = Individual::new(2, 1);
        let mut b = Individual::new(2, 1);
        a.ovas = vec![1.0, 2.0];
        b.ovas = vec![2.0, 3.0];
        assert_eq!(compare_det(&a, &b), (true, false));
        assert_eq!(compare_det(&b, &a), (false, true));

        // Trade-off: neither dominates.
        b.ovas = vec![2.0, 1.0];
        assert_eq!(compare_det(&a, &b), (false, false));
    }

    #[test]
    fn test_compare_det_antisymmetric() {
        let mut a = Individual::new(2, 1);
        let mut b = Individual::new(2, 1);
        a.ovas = vec![1.0, 1.0];
        b.ovas = vec![1.0, 2.0];
        let (a_dom, _) = compare_det(&a, &b);
        assert!(a_dom);
        let (b_dom_rev, _) = compare_det(&b, &a);
        assert!(!b_dom_rev, "if a dominates b, b must not dominate a");
    }

    #[test]
    fn test_compare_det_feasibility_rules() {
        let mut feas = Individual::new(1, 1);
        feas.ovas = vec![100.0];
        let mut unfeas = Individual::new(1, 1);
        unfeas.ovas = vec![1.0];
        unfeas.oors = vec![0.1];

        // Feasible beats unfeasible regardless of objective values.
        assert_eq!(compare_det(&feas, &unfeas), (true, false));
        assert_eq!(compare_det(&unfeas, &feas), (false, true));

        // Both unfeasible: compared over violations.
        let mut worse = Individual::new(1, 1);
        worse.oors = vec![0.5];
        assert_eq!(compare_det(&unfeas, &worse), (true, false));
    }

    #[test]
    fn test_compare_prob_phi_zero_is_strict() {
        let mut rng = create_rng(42);
        let mut a = Individual::new(2, 0);
        let mut b = Individual::new(2, 0);
        a.ovas = vec![1.0, 1.0];
        b.ovas = vec![2.0, 2.0];
        for _ in 0..50 {
            assert!(compare_prob(&a, &b, 0.0, &mut rng));
            assert!(!compare_prob(&b, &a, 0.0, &mut rng));
        }
    }

    #[test]
    fn test_compare_prob_favors_less_worse() {
        let mut rng = create_rng(42);
        let mut a = Individual::new(3, 0);
        let mut b = Individual::new(3, 0);
        // a worse in one component, b worse in two.
        a.ovas = vec![2.0, 1.0, 1.0];
        b.ovas = vec![1.0, 2.0, 2.0];
        let n = 10_000;
        let wins = (0..n).filter(|_| compare_prob(&a, &b, 1.0, &mut rng)).count();
        // pa = 1/2, pb = 1/3, expected win rate 0.6.
        assert!(
            (5500..6500).contains(&wins),
            "expected ~60% wins for a, got {wins}/{n}"
        );
    }

    #[test]
    fn test_distance_zero_for_identical() {
        let a = full_individual();
        let mut span = DistanceSpan::new(3, 6, 2);
        span.reset_from(&a);
        assert_eq!(distance(&a, &a, &span, true), 0.0);
    }

    #[test]
    fn test_distance_normalized_floats() {
        let mut rng = create_rng(42);
        let a = Individual::new(1, 0).with_floats(&[0.0], 1, &mut rng);
        let b = Individual::new(1, 0).with_floats(&[2.0], 1, &mut rng);
        let mut span = DistanceSpan::new(0, 1, 1);
        span.reset_from(&a);
        span.absorb(&b);
        // Full span apart: normalized distance 1.
        assert!((distance(&a, &b, &span, false) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_zero_span_contributes_zero() {
        let mut rng = create_rng(42);
        let a = Individual::new(1, 0).with_floats(&[5.0], 1, &mut rng).with_ints(&[3]);
        let b = Individual::new(1, 0).with_floats(&[5.0], 1, &mut rng).with_ints(&[3]);
        let mut span = DistanceSpan::new(1, 1, 1);
        span.reset_from(&a);
        span.absorb(&b);
        assert_eq!(distance(&a, &b, &span, false), 0.0);
    }

    #[test]
    fn test_distance_discrete_mismatch_fraction() {
        let a = Individual::new(1, 0).with_strings(&["x", "y", "z", "w"]);
        let b = Individual::new(1, 0).with_strings(&["x", "q", "z", "p"]);
        let span = DistanceSpan::new(0, 0, 1);
        assert!((distance(&a, &b, &span, false) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_format_genes_mentions_every_kind() {
        let ind = full_individual();
        let line = ind.format_genes();
        assert!(line.contains("-7"));
        assert!(line.contains("left"));
        assert!(line.contains("alpha"));
    }
}
