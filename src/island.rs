//! One evolutionary unit: a population, its double buffer, and the
//! per-generation update.
//!
//! Two updates are available. The crowding update partitions the
//! population into random crowds, reproduces within each crowd, matches
//! parents with their nearest offspring by solving a linear assignment
//! over a normalized distance matrix, and resolves each matched pair with
//! a tournament. The standard update is classic fitness-proportional (or
//! rank-based) selection with roulette-wheel or stochastic universal
//! sampling.
//!
//! Every island owns its random stream, its scratch buffers and its
//! report; between migration points no other task touches them.
//!
//! # References
//!
//! - Mahfoud (1995), "Niching Methods for Genetic Algorithms"
//! - Baker (1987), "Reducing Bias and Inefficiency in the Selection
//!   Algorithm"

use crate::bingo::Bingo;
use crate::config::{EvolverConfig, GaType, ObjFn};
use crate::error::{EvolveError, Result};
use crate::individual::{compare_det, compare_prob, distance, DistanceSpan, Individual};
use crate::munkres::Munkres;
use crate::operators::{crossover, mutate, FltCxFn};
use crate::population::Population;
use crate::report::Report;
use crate::rng::{create_rng, flip_coin, random_groups};
use rand::rngs::StdRng;
use rand::Rng;
use std::fmt::Write as _;
use tracing::debug;

/// One island: population, backup buffer, scratch, and results.
pub struct Island {
    /// Index of this island.
    pub id: usize,
    conf: EvolverConfig,
    obj: ObjFn,
    flt_cx: FltCxFn,
    bingo: Bingo,
    rng: StdRng,

    /// Current population, sorted best-first after every generation.
    pub pop: Population,
    /// Backup population (double buffer for the update).
    pub bkp: Population,
    /// Accumulated report text.
    pub report: Report,

    /// Best objective values per generation, `[nova][tf + 1]`.
    pub out_ovas: Vec<Vec<f64>>,
    /// Best out-of-range values per generation, `[noor][tf + 1]`.
    pub out_oors: Vec<Vec<f64>>,
    /// Generation stamps matching the series above.
    pub out_times: Vec<f64>,
    /// Number of objective evaluations performed.
    pub nfeval: usize,

    // distance normalization spans, refreshed each generation
    span: DistanceSpan,

    // standard-update scratch
    fitness: Vec<f64>,
    prob: Vec<f64>,
    cumprob: Vec<f64>,
    selinds: Vec<usize>,
    pairs_a: Vec<usize>,
    pairs_b: Vec<usize>,

    // crowding scratch
    indices: Vec<usize>,
    crowds: Vec<Vec<usize>>,
    dist_r1: Vec<Vec<f64>>,
    dist_r2: Vec<Vec<f64>>,
    match_r1: Munkres,
    match_r2: Munkres,
    offspring: Vec<Individual>,
    round2: Vec<usize>,

    // diversity scratch
    colbuf: Vec<f64>,
    devbases: Vec<f64>,
}

impl Island {
    /// Builds island `id`: generates its population, evaluates it, and
    /// allocates every scratch buffer the updates need.
    pub fn new(id: usize, conf: &EvolverConfig) -> Result<Self> {
        let mut rng = create_rng(conf.seed.wrapping_add(id as u64));

        let generator = conf
            .generator()
            .ok_or_else(|| EvolveError::Config("no population generator configured".into()))?
            .clone();
        let pop = generator.as_ref()(id, conf, &mut rng);
        if pop.len() != conf.ninds {
            return Err(EvolveError::Config(format!(
                "generator produced {} individuals, expected {}",
                pop.len(),
                conf.ninds
            )));
        }
        if pop[0].nfltgenes > 0 && pop[0].nfltgenes != conf.range_flt.len() {
            return Err(EvolveError::Config(format!(
                "generator produced individuals with {} float genes, but range_flt has {} entries",
                pop[0].nfltgenes,
                conf.range_flt.len()
            )));
        }

        let obj = conf
            .ova_oor
            .clone()
            .ok_or_else(|| EvolveError::Config("objective callback (ova_oor) must be set".into()))?;
        let flt_cx = conf
            .registry
            .resolve_flt_cx(&conf.ops.flt_cx_name)
            .ok_or_else(|| {
                EvolveError::Config(format!("unknown float crossover {:?}", conf.ops.flt_cx_name))
            })?;
        let bingo = conf
            .bingo
            .clone()
            .unwrap_or_else(|| Bingo::with_float_ranges(&conf.range_flt));

        let nints = pop[0].ints.len();
        let nflts = pop[0].floats.len();
        let bkp = pop.get_copy();

        // Crowding scratch: n parents per crowd compete against
        // m = 2 * (n - 1) offspring, in two assignment rounds.
        let (crowds, dist_r1, dist_r2, match_r1, match_r2, offspring, round2) =
            if conf.ga_type == GaType::Crowd {
                let n = conf.crowd_size;
                let m = 2 * (n - 1);
                (
                    vec![vec![0usize; n]; conf.ninds / n],
                    vec![vec![0.0; m]; n],
                    if m > n { vec![vec![0.0; m - n]; n] } else { Vec::new() },
                    Munkres::new(n, m),
                    Munkres::new(n, (m - n).max(1)),
                    (0..m).map(|_| pop[0].get_copy()).collect(),
                    vec![0usize; m.saturating_sub(n)],
                )
            } else {
                (
                    Vec::new(),
                    Vec::new(),
                    Vec::new(),
                    Munkres::new(1, 1),
                    Munkres::new(1, 1),
                    Vec::new(),
                    Vec::new(),
                )
            };

        let mut island = Self {
            id,
            conf: conf.clone(),
            obj,
            flt_cx,
            bingo,
            rng,
            pop,
            bkp,
            report: Report::new(),
            out_ovas: vec![vec![0.0; conf.tf + 1]; conf.nova],
            out_oors: vec![vec![0.0; conf.tf + 1]; conf.noor],
            out_times: vec![0.0; conf.tf + 1],
            nfeval: 0,
            span: DistanceSpan::new(nints, nflts, conf.nova),
            fitness: vec![0.0; conf.ninds],
            prob: vec![0.0; conf.ninds],
            cumprob: vec![0.0; conf.ninds],
            selinds: vec![0; conf.ninds],
            pairs_a: vec![0; conf.ninds / 2],
            pairs_b: vec![0; conf.ninds / 2],
            indices: (0..conf.ninds).collect(),
            crowds,
            dist_r1,
            dist_r2,
            match_r1,
            match_r2,
            offspring,
            round2,
            colbuf: vec![0.0; conf.ninds],
            devbases: vec![0.0; nflts],
        };

        island.evaluate_pop_range(0, island.conf.ninds, 0)?;
        island.update_demerits_and_sort();
        island.record(0);
        Ok(island)
    }

    /// Runs one generation at time `t`.
    pub fn run_generation(&mut self, t: usize) -> Result<()> {
        match self.conf.ga_type {
            GaType::Crowd => self.update_crowding(t)?,
            GaType::Standard => self.update_standard(t)?,
        }

        // The backup now holds the next generation; the previous one
        // stays available for elitism.
        std::mem::swap(&mut self.pop, &mut self.bkp);
        self.update_demerits_and_sort();

        if self.conf.elite {
            let last = self.pop.len() - 1;
            let (prev_dominates, _) = compare_det(&self.bkp[0], &self.pop[last]);
            if prev_dominates {
                let (bkp, pop) = (&self.bkp, &mut self.pop);
                bkp[0].copy_into(&mut pop[last]);
                // The survivor carries a demerit from the previous
                // scaling; recompute before ordering.
                self.update_demerits_and_sort();
            }
        }

        let mut averho = 0.0;
        if self.pop[0].nfltgenes > 0 {
            averho = self.diversity_rho();
            if averho < self.conf.reg_tol {
                debug!(island = self.id, time = t, rho = averho, "regenerating");
                self.regenerate(t)?;
                if self.conf.do_report {
                    let _ = writeln!(self.report, "time={t}: regeneration");
                }
            }
        }

        if self.conf.do_report {
            self.write_pop_to_report(t, averho);
        }
        if let Some(pp) = &self.conf.post_proc {
            pp.as_ref()(self.id, t, &self.pop);
        }
        self.record(t);
        Ok(())
    }

    // ------------------------------------------------------------------
    // crowding update
    // ------------------------------------------------------------------

    fn update_crowding(&mut self, t: usize) -> Result<()> {
        {
            let Self {
                indices,
                crowds,
                rng,
                ..
            } = self;
            random_groups(crowds, indices, rng);
        }

        let n = self.conf.crowd_size;
        let m = 2 * (n - 1);
        let ncrowd = self.crowds.len();

        for ic in 0..ncrowd {
            // Reproduce consecutive parent pairs into the offspring pool.
            for r in 0..n - 1 {
                let (k, l) = (2 * r, 2 * r + 1);
                let ia = self.crowds[ic][r];
                let ib = self.crowds[ic][r + 1];
                {
                    let (left, right) = self.offspring.split_at_mut(l);
                    let a = &mut left[k];
                    let b = &mut right[0];
                    if self.conf.ops.use_4inds {
                        let jc = (ic + 1) % ncrowd;
                        let ic1 = self.crowds[jc][0];
                        let id1 = self.crowds[jc][1];
                        let (pa, pb, pc, pd) = four_nondom(
                            &self.pop[ia],
                            &self.pop[ib],
                            &self.pop[ic1],
                            &self.pop[id1],
                        );
                        crossover(
                            a,
                            b,
                            pa,
                            pb,
                            Some(pc),
                            Some(pd),
                            &self.conf.ops,
                            self.flt_cx,
                            &mut self.rng,
                        );
                    } else {
                        crossover(
                            a,
                            b,
                            &self.pop[ia],
                            &self.pop[ib],
                            None,
                            None,
                            &self.conf.ops,
                            self.flt_cx,
                            &mut self.rng,
                        );
                    }
                    mutate(a, &self.conf.ops, &self.bingo, &mut self.rng);
                    mutate(b, &self.conf.ops, &self.bingo, &mut self.rng);
                }
                self.evaluate_offspring(k, t)?;
                self.evaluate_offspring(l, t)?;
            }

            // Round 1: pair each parent with its closest offspring.
            for i in 0..n {
                let pi = self.crowds[ic][i];
                for j in 0..m {
                    self.dist_r1[i][j] = distance(
                        &self.pop[pi],
                        &self.offspring[j],
                        &self.span,
                        self.conf.dist_ovs,
                    );
                }
            }
            self.match_r1.set_cost_matrix(&self.dist_r1);
            self.match_r1.run()?;

            if m > n {
                let mut k = 0;
                for j in 0..m {
                    if !self.match_r1.links.contains(&Some(j)) {
                        self.round2[k] = j;
                        k += 1;
                    }
                }
            }

            for i in 0..n {
                let pi = self.crowds[ic][i];
                let j = self.match_r1.links[i].ok_or_else(|| {
                    EvolveError::Assignment("round-1 matching left a parent unpaired".into())
                })?;
                let parent_wins = fight(
                    &self.pop[pi],
                    &self.offspring[j],
                    self.conf.comp_prob,
                    self.conf.pareto_phi,
                    &mut self.rng,
                );
                if parent_wins {
                    let (pop, bkp) = (&self.pop, &mut self.bkp);
                    pop[pi].copy_into(&mut bkp[pi]);
                } else {
                    let (off, bkp) = (&self.offspring, &mut self.bkp);
                    off[j].copy_into(&mut bkp[pi]);
                }
            }

            // Round 2: leftover offspring challenge the freshly updated
            // backup slots.
            if m > n {
                for i in 0..n {
                    let pi = self.crowds[ic][i];
                    for j in 0..(m - n) {
                        let oj = self.round2[j];
                        self.dist_r2[i][j] = distance(
                            &self.bkp[pi],
                            &self.offspring[oj],
                            &self.span,
                            self.conf.dist_ovs,
                        );
                    }
                }
                self.match_r2.set_cost_matrix(&self.dist_r2);
                self.match_r2.run()?;
                for i in 0..n {
                    let Some(k2) = self.match_r2.links[i] else {
                        continue;
                    };
                    let oj = self.round2[k2];
                    let pi = self.crowds[ic][i];
                    let holder_wins = fight(
                        &self.bkp[pi],
                        &self.offspring[oj],
                        self.conf.comp_prob,
                        self.conf.pareto_phi,
                        &mut self.rng,
                    );
                    if !holder_wins {
                        let (off, bkp) = (&self.offspring, &mut self.bkp);
                        off[oj].copy_into(&mut bkp[pi]);
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // standard update
    // ------------------------------------------------------------------

    /// Rank or scaled-demerit fitness, roulette/SUS sampling, pairwise
    /// reproduction into the backup buffer. Expects a sorted population.
    fn update_standard(&mut self, t: usize) -> Result<()> {
        let ninds = self.conf.ninds;

        let mut sumfit = 0.0;
        if self.conf.rnk {
            let sp = self.conf.rnk_sp;
            for i in 0..ninds {
                let f = 2.0 - sp + 2.0 * (sp - 1.0) * (ninds - i - 1) as f64 / (ninds - 1) as f64;
                self.fitness[i] = f;
                sumfit += f;
            }
        } else {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for ind in self.pop.iter() {
                lo = lo.min(ind.demerit);
                hi = hi.max(ind.demerit);
            }
            let spread = hi - lo;
            for (i, ind) in self.pop.iter().enumerate() {
                self.fitness[i] = if spread > 1e-16 {
                    (hi - ind.demerit) / spread
                } else {
                    1.0
                };
                sumfit += self.fitness[i];
            }
        }

        for i in 0..ninds {
            self.prob[i] = self.fitness[i] / sumfit;
            self.cumprob[i] = self.prob[i] + if i > 0 { self.cumprob[i - 1] } else { 0.0 };
        }

        if self.conf.rws {
            roulette_select(&mut self.selinds, &self.cumprob, &mut self.rng);
        } else {
            sus_select(&mut self.selinds, &self.cumprob, &mut self.rng);
        }
        filter_pairs(
            &mut self.pairs_a,
            &mut self.pairs_b,
            &self.selinds,
            &mut self.rng,
        );

        let h = ninds / 2;
        for i in 0..h {
            let ia = self.pairs_a[i];
            let ib = self.pairs_b[i];
            let (left, right) = self.bkp.split_at_mut(h);
            crossover(
                &mut left[i],
                &mut right[i],
                &self.pop[ia],
                &self.pop[ib],
                None,
                None,
                &self.conf.ops,
                self.flt_cx,
                &mut self.rng,
            );
            mutate(&mut left[i], &self.conf.ops, &self.bingo, &mut self.rng);
            mutate(&mut right[i], &self.conf.ops, &self.bingo, &mut self.rng);
        }

        self.evaluate_bkp_range(0, ninds, t)
    }

    // ------------------------------------------------------------------
    // evaluation, demerits, spans
    // ------------------------------------------------------------------

    fn evaluate_pop_range(&mut self, from: usize, to: usize, t: usize) -> Result<()> {
        for i in from..to {
            self.obj.as_ref()(&mut self.pop[i], self.id, t, &mut self.report);
            self.nfeval += 1;
            check_contract(&self.pop[i], self.conf.nova, self.conf.noor)?;
        }
        Ok(())
    }

    fn evaluate_bkp_range(&mut self, from: usize, to: usize, t: usize) -> Result<()> {
        for i in from..to {
            self.obj.as_ref()(&mut self.bkp[i], self.id, t, &mut self.report);
            self.nfeval += 1;
            check_contract(&self.bkp[i], self.conf.nova, self.conf.noor)?;
        }
        Ok(())
    }

    fn evaluate_offspring(&mut self, k: usize, t: usize) -> Result<()> {
        self.obj.as_ref()(&mut self.offspring[k], self.id, t, &mut self.report);
        self.nfeval += 1;
        check_contract(&self.offspring[k], self.conf.nova, self.conf.noor)
    }

    /// Refreshes normalization spans, recomputes demerits and scores, and
    /// sorts the population best-first.
    pub fn update_demerits_and_sort(&mut self) {
        self.span.reset_from(&self.pop[0]);
        for ind in self.pop.iter().skip(1) {
            self.span.absorb(ind);
        }
        self.pop.compute_demerits();
        self.pop.compute_scores();
        self.pop.sort();
    }

    // ------------------------------------------------------------------
    // diversity and regeneration
    // ------------------------------------------------------------------

    /// The deviation statistic rho: per float base, the standard (or mean
    /// absolute) deviation across the population normalized by
    /// `1 + max |base|`, averaged over all bases. Small rho means the
    /// population has gone homogeneous.
    pub fn diversity_rho(&mut self) -> f64 {
        let nflts = self.pop[0].floats.len();
        if nflts == 0 {
            return 0.0;
        }
        for p in 0..nflts {
            let mut largest: f64 = 0.0;
            self.colbuf.clear();
            for ind in self.pop.iter() {
                let x = ind.floats[p];
                self.colbuf.push(x);
                largest = largest.max(x.abs());
            }
            let dev = if self.conf.use_std_dev {
                std_dev(&self.colbuf)
            } else {
                mean_abs_dev(&self.colbuf)
            };
            self.devbases[p] = dev / (1.0 + largest);
        }
        self.devbases.iter().sum::<f64>() / nflts as f64
    }

    /// Replaces the worst `reg_pct * ninds` individuals with fresh random
    /// draws inside the gene ranges, re-evaluates and re-sorts.
    pub fn regenerate(&mut self, t: usize) -> Result<()> {
        let ninds = self.pop.len();
        let start = ninds - (self.conf.reg_pct * ninds as f64) as usize;
        for i in start..ninds {
            for g in 0..self.pop[i].nfltgenes {
                let (lo, hi) = self.conf.range_flt[g];
                let x = if hi > lo {
                    self.rng.random_range(lo..hi)
                } else {
                    lo
                };
                self.pop[i].set_float(g, x, &mut self.rng);
            }
        }
        self.evaluate_pop_range(start, ninds, t)?;
        self.update_demerits_and_sort();
        Ok(())
    }

    // ------------------------------------------------------------------
    // results and reporting
    // ------------------------------------------------------------------

    fn record(&mut self, t: usize) {
        if t >= self.out_times.len() {
            return;
        }
        for j in 0..self.conf.nova {
            self.out_ovas[j][t] = self.pop[0].ovas[j];
        }
        for j in 0..self.conf.noor {
            self.out_oors[j][t] = self.pop[0].oors[j];
        }
        self.out_times[t] = t as f64;
    }

    fn write_pop_to_report(&mut self, t: usize, averho: f64) {
        let _ = writeln!(self.report, "time={t} averho={averho}");
        let table = self.pop.output_table();
        self.report.append(&table);
    }

    /// Writes this island's report file when a filename key is configured.
    pub fn save_report(&self) {
        if self.conf.fn_key.is_empty() {
            return;
        }
        crate::report::save_island_report(&self.conf.dir_out, &self.conf.fn_key, self.id, &self.report);
    }

}

/// Resolves one tournament: `true` when `a` wins.
///
/// Deterministic mode breaks dominance ties with a fair coin;
/// probabilistic mode delegates to the phi-controlled Pareto draw.
pub(crate) fn fight<R: Rng>(
    a: &Individual,
    b: &Individual,
    comp_prob: bool,
    phi: f64,
    rng: &mut R,
) -> bool {
    if comp_prob {
        return compare_prob(a, b, phi, rng);
    }
    let (a_dom, b_dom) = compare_det(a, b);
    if a_dom {
        return true;
    }
    if b_dom {
        return false;
    }
    flip_coin(rng, 0.5)
}

/// Canonicalizes four parents into a dominance partial order, best first.
fn four_nondom<'a>(
    mut a: &'a Individual,
    mut b: &'a Individual,
    mut c: &'a Individual,
    mut d: &'a Individual,
) -> (&'a Individual, &'a Individual, &'a Individual, &'a Individual) {
    if compare_det(b, a).0 {
        std::mem::swap(&mut a, &mut b);
    }
    if compare_det(c, b).0 {
        std::mem::swap(&mut b, &mut c);
    }
    if compare_det(d, c).0 {
        std::mem::swap(&mut c, &mut d);
    }
    if compare_det(b, a).0 {
        std::mem::swap(&mut a, &mut b);
    }
    if compare_det(c, b).0 {
        std::mem::swap(&mut b, &mut c);
    }
    if compare_det(b, a).0 {
        std::mem::swap(&mut a, &mut b);
    }
    (a, b, c, d)
}

fn check_contract(ind: &Individual, nova: usize, noor: usize) -> Result<()> {
    if ind.ovas.len() != nova || ind.oors.len() != noor {
        return Err(EvolveError::Contract(format!(
            "callback resized objective storage: got {}/{} values, expected {}/{}",
            ind.ovas.len(),
            ind.oors.len(),
            nova,
            noor
        )));
    }
    for (j, &oor) in ind.oors.iter().enumerate() {
        if oor < 0.0 {
            return Err(EvolveError::Contract(format!(
                "oors[{j}] = {oor} is negative; out-of-range values must be >= 0"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// selection sampling (standard update)
// ============================================================================

/// Roulette-wheel sampling: one independent spin per slot.
fn roulette_select<R: Rng>(selinds: &mut [usize], cumprob: &[f64], rng: &mut R) {
    for slot in selinds.iter_mut() {
        let u: f64 = rng.random_range(0.0..1.0);
        *slot = locate(cumprob, u);
    }
}

/// Stochastic universal sampling: evenly spaced pointers, one spin total.
fn sus_select<R: Rng>(selinds: &mut [usize], cumprob: &[f64], rng: &mut R) {
    let n = selinds.len();
    let step = 1.0 / n as f64;
    let start: f64 = rng.random_range(0.0..step);
    for (k, slot) in selinds.iter_mut().enumerate() {
        *slot = locate(cumprob, start + k as f64 * step);
    }
}

fn locate(cumprob: &[f64], u: f64) -> usize {
    for (i, &c) in cumprob.iter().enumerate() {
        if u < c {
            return i;
        }
    }
    cumprob.len() - 1
}

/// Pairs up selected indices, nudging identical pairs apart when the
/// selection pool allows it.
fn filter_pairs<R: Rng>(a: &mut [usize], b: &mut [usize], selinds: &[usize], rng: &mut R) {
    let h = a.len();
    for i in 0..h {
        a[i] = selinds[2 * i];
        b[i] = selinds[2 * i + 1];
        if a[i] != b[i] {
            continue;
        }
        let mut fixed = false;
        for _ in 0..selinds.len() {
            let cand = selinds[rng.random_range(0..selinds.len())];
            if cand != a[i] {
                b[i] = cand;
                fixed = true;
                break;
            }
        }
        if !fixed {
            if let Some(&cand) = selinds.iter().find(|&&s| s != a[i]) {
                b[i] = cand;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::pop_flt_gen;

    fn sphere_config() -> EvolverConfig {
        EvolverConfig::default()
            .with_ninds(12)
            .with_crowd_size(3)
            .with_range_flt(vec![(-2.0, 2.0), (-2.0, 2.0)])
            .with_seed(42)
            .with_ova_oor(|ind, _isl, _t, _rep| {
                let x = ind.get_floats();
                ind.ovas[0] = x[0] * x[0] + x[1] * x[1];
            })
            .with_pop_flt_gen(pop_flt_gen)
    }

    fn new_island(conf: &EvolverConfig) -> Island {
        let mut conf = conf.clone();
        conf.prepare();
        conf.validate().unwrap();
        Island::new(0, &conf).unwrap()
    }

    #[test]
    fn test_island_initial_state_sorted() {
        let isl = new_island(&sphere_config());
        assert_eq!(isl.pop.len(), 12);
        assert!(isl
            .pop
            .windows(2)
            .all(|w| w[0].demerit <= w[1].demerit));
        assert_eq!(isl.nfeval, 12);
    }

    #[test]
    fn test_generation_preserves_sizes_and_order() {
        let mut isl = new_island(&sphere_config());
        for t in 1..=5 {
            isl.run_generation(t).unwrap();
            assert_eq!(isl.pop.len(), 12);
            assert_eq!(isl.bkp.len(), 12);
            assert!(isl.pop.windows(2).all(|w| w[0].demerit <= w[1].demerit));
        }
    }

    #[test]
    fn test_crowding_improves_sphere() {
        let mut isl = new_island(&sphere_config());
        let before = isl.pop[0].ovas[0];
        for t in 1..=60 {
            isl.run_generation(t).unwrap();
        }
        let after = isl.pop[0].ovas[0];
        assert!(
            after <= before && after < 0.1,
            "sphere best should approach 0, got {after} (started at {before})"
        );
    }

    #[test]
    fn test_standard_update_improves_sphere() {
        let mut conf = sphere_config().with_ga_type(GaType::Standard);
        conf.ops.flt_cx_name = "blend".into();
        conf.ops.pm = 0.1;
        let mut isl = new_island(&conf);
        for t in 1..=80 {
            isl.run_generation(t).unwrap();
        }
        assert!(
            isl.pop[0].ovas[0] < 0.5,
            "standard GA should improve the sphere, got {}",
            isl.pop[0].ovas[0]
        );
    }

    #[test]
    fn test_elitism_keeps_best_monotone() {
        let mut isl = new_island(&sphere_config());
        let mut best = isl.pop[0].ovas[0];
        for t in 1..=30 {
            isl.run_generation(t).unwrap();
            let cur = isl.pop[0].ovas[0];
            assert!(
                cur <= best + 1e-12,
                "elitism must not lose the best: {cur} > {best}"
            );
            best = cur;
        }
    }

    #[test]
    fn test_contract_violation_aborts() {
        let conf = sphere_config()
            .with_objectives(1, 1)
            .with_ova_oor(|ind, _isl, _t, _rep| {
                ind.ovas[0] = 0.0;
                ind.oors[0] = -1.0; // negative: contract violation
            });
        let mut conf = conf;
        conf.prepare();
        assert!(matches!(
            Island::new(0, &conf),
            Err(EvolveError::Contract(_))
        ));
    }

    #[test]
    fn test_range_flt_gene_count_mismatch_rejected() {
        // A caller-supplied generator can produce any float-gene count;
        // a mismatch against range_flt must fail initialization instead
        // of indexing out of bounds at the first regeneration.
        let mut conf = sphere_config().with_pop_flt_gen(|_id, conf, rng| {
            let mut pop = Population::default();
            for _ in 0..conf.ninds {
                pop.push(
                    Individual::new(conf.nova, conf.noor)
                        .with_floats(&[0.0, 0.0, 0.0], 1, rng),
                );
            }
            pop
        });
        conf.prepare();
        assert!(matches!(
            Island::new(0, &conf),
            Err(EvolveError::Config(_))
        ));
    }

    #[test]
    fn test_rho_zero_on_homogeneous_population() {
        let conf = sphere_config().with_pop_flt_gen(|_id, conf, rng| {
            let mut pop = Population::default();
            for _ in 0..conf.ninds {
                pop.push(
                    Individual::new(conf.nova, conf.noor).with_floats(&[0.5, 0.5], 1, rng),
                );
            }
            pop
        });
        let mut isl = new_island(&conf);
        assert_eq!(isl.diversity_rho(), 0.0);
    }

    #[test]
    fn test_regeneration_trigger_replaces_worst() {
        // Identical population: rho = 0 < reg_tol triggers regeneration
        // during the generation; afterwards the population is no longer
        // homogeneous and every gene stays inside its range.
        let mut conf = sphere_config()
            .with_ninds(10)
            .with_crowd_size(2)
            .with_regeneration(1e-3, 0.3)
            .with_pop_flt_gen(|_id, conf, rng| {
                let mut pop = Population::default();
                for _ in 0..conf.ninds {
                    pop.push(
                        Individual::new(conf.nova, conf.noor).with_floats(&[1.0, 1.0], 1, rng),
                    );
                }
                pop
            });
        conf.ops.pc = 0.0;
        conf.ops.pm = 0.0;
        let mut isl = new_island(&conf);
        isl.run_generation(1).unwrap();

        let fresh = isl
            .pop
            .iter()
            .filter(|ind| {
                (ind.get_float(0) - 1.0).abs() > 1e-12 || (ind.get_float(1) - 1.0).abs() > 1e-12
            })
            .count();
        assert!(
            fresh >= 1,
            "regeneration should inject at least one fresh individual"
        );
        for ind in isl.pop.iter() {
            for g in 0..2 {
                let x = ind.get_float(g);
                assert!((-2.0..=2.0).contains(&x));
            }
        }
    }

    #[test]
    fn test_fight_deterministic() {
        let mut rng = create_rng(42);
        let mut a = Individual::new(1, 0);
        let mut b = Individual::new(1, 0);
        a.ovas[0] = 1.0;
        b.ovas[0] = 2.0;
        for _ in 0..20 {
            assert!(fight(&a, &b, false, 0.0, &mut rng));
            assert!(!fight(&b, &a, false, 0.0, &mut rng));
        }
    }

    #[test]
    fn test_fight_tie_is_roughly_fair() {
        let mut rng = create_rng(42);
        let mut a = Individual::new(2, 0);
        let mut b = Individual::new(2, 0);
        a.ovas = vec![1.0, 2.0];
        b.ovas = vec![2.0, 1.0];
        let n = 10_000;
        let wins = (0..n).filter(|_| fight(&a, &b, false, 0.0, &mut rng)).count();
        assert!(
            (4500..5500).contains(&wins),
            "tie should be a fair coin, got {wins}/{n}"
        );
    }

    #[test]
    fn test_four_nondom_orders_best_first() {
        let inds: Vec<Individual> = (0..4)
            .map(|i| {
                let mut ind = Individual::new(1, 0);
                ind.ovas[0] = [3.0, 1.0, 4.0, 2.0][i];
                ind
            })
            .collect();
        let (a, b, c, d) = four_nondom(&inds[0], &inds[1], &inds[2], &inds[3]);
        assert_eq!(a.ovas[0], 1.0);
        assert_eq!(d.ovas[0], 4.0);
        let mids = [b.ovas[0], c.ovas[0]];
        assert!(mids.contains(&2.0) && mids.contains(&3.0));
    }

    #[test]
    fn test_locate_and_sus_cover_distribution() {
        let cumprob = [0.25, 0.5, 0.75, 1.0];
        assert_eq!(locate(&cumprob, 0.0), 0);
        assert_eq!(locate(&cumprob, 0.3), 1);
        assert_eq!(locate(&cumprob, 0.9), 3);

        let mut rng = create_rng(42);
        let mut selinds = [0usize; 4];
        sus_select(&mut selinds, &cumprob, &mut rng);
        // Uniform fitness: SUS picks each index exactly once.
        let mut sorted = selinds;
        sorted.sort_unstable();
        assert_eq!(sorted, [0, 1, 2, 3]);
    }

    #[test]
    fn test_roulette_prefers_heavy_slots() {
        // Slot 0 owns 90% of the wheel.
        let cumprob = [0.9, 0.95, 1.0];
        let mut rng = create_rng(42);
        let mut selinds = [0usize; 1000];
        roulette_select(&mut selinds, &cumprob, &mut rng);
        let zeros = selinds.iter().filter(|&&s| s == 0).count();
        assert!(zeros > 800, "expected ~900 hits on slot 0, got {zeros}");
    }

    #[test]
    fn test_filter_pairs_avoids_self_pairing() {
        let mut rng = create_rng(42);
        let selinds = [3, 3, 1, 1, 2, 5];
        let mut a = [0usize; 3];
        let mut b = [0usize; 3];
        filter_pairs(&mut a, &mut b, &selinds, &mut rng);
        for i in 0..3 {
            assert_ne!(a[i], b[i], "pair {i} must not self-pair when avoidable");
        }
    }

    #[test]
    fn test_report_accumulates_when_enabled() {
        let mut conf = sphere_config();
        conf.do_report = true;
        let mut isl = new_island(&conf);
        isl.run_generation(1).unwrap();
        assert!(isl.report.as_str().contains("time=1"));
        assert!(isl.report.as_str().contains("Demerit"));
    }

    #[test]
    fn test_out_series_recorded() {
        let mut isl = new_island(&sphere_config());
        for t in 1..=3 {
            isl.run_generation(t).unwrap();
        }
        assert_eq!(isl.out_times[..4], [0.0, 1.0, 2.0, 3.0]);
        // Recorded best values match the series tail.
        assert_eq!(isl.out_ovas[0][3], isl.pop[0].ovas[0]);
    }
}
